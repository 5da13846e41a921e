//! Crowd leaderboard crawler.
//!
//! The leaderboard is published as dated result files in a hub Space. Each
//! run lists the Space, picks the newest files whose date has not been
//! imported yet and stores their rows as arena rankings for that date.

use super::{Crawler, IngestReport, IngestSource};
use crate::config::{ArenaConfig, HubConfig};
use crate::network::HttpClient;
use crate::store::SnapshotStore;
use crate::{Result, TrackerError};
use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

static RESULT_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(ArenaConfig::FILE_PATTERN).expect("leaderboard file regex must compile")
});

/// A dated leaderboard result file in the Space.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LeaderboardFile {
    pub snapshot_date: NaiveDate,
    pub filename: String,
}

/// One decoded leaderboard row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArenaRow {
    #[serde(alias = "model_name", alias = "key")]
    pub model: String,
    pub rating: f64,
    #[serde(alias = "rank")]
    pub final_ranking: i64,
}

impl ArenaRow {
    /// Integer score stored for the row.
    pub fn elo_score(&self) -> Result<i64> {
        if !self.rating.is_finite() {
            return Err(TrackerError::parse(
                "leaderboard row",
                format!("non-finite rating for {}", self.model),
            ));
        }
        Ok(self.rating.round() as i64)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LeaderboardDocument {
    Rows(Vec<serde_json::Value>),
    Table {
        #[serde(alias = "leaderboard_table_df", alias = "leaderboard")]
        leaderboard_table: Vec<serde_json::Value>,
    },
}

#[derive(Debug, Deserialize)]
struct SpaceInfo {
    #[serde(default)]
    siblings: Vec<SpaceSibling>,
}

#[derive(Debug, Deserialize)]
struct SpaceSibling {
    rfilename: String,
}

/// Pick the dated result files out of a Space listing, oldest first.
pub fn leaderboard_files<I, S>(filenames: I) -> Vec<LeaderboardFile>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut files: Vec<LeaderboardFile> = filenames
        .into_iter()
        .filter_map(|name| {
            let name = name.as_ref();
            let caps = RESULT_FILE_RE.captures(name)?;
            let snapshot_date = NaiveDate::parse_from_str(&caps[1], "%Y%m%d").ok()?;
            Some(LeaderboardFile {
                snapshot_date,
                filename: name.to_string(),
            })
        })
        .collect();
    files.sort();
    files
}

/// Newest files whose date is not imported yet, at most `max_files`.
pub fn select_new_files(
    files: &[LeaderboardFile],
    imported: &BTreeSet<NaiveDate>,
    max_files: usize,
) -> Vec<LeaderboardFile> {
    files
        .iter()
        .rev()
        .filter(|f| !imported.contains(&f.snapshot_date))
        .take(max_files)
        .cloned()
        .collect()
}

/// Decode a result file into rows, keeping per-row failures separate.
pub fn parse_leaderboard(body: &str) -> Result<Vec<Result<ArenaRow>>> {
    let document: LeaderboardDocument = serde_json::from_str(body)
        .map_err(|e| TrackerError::parse("leaderboard file", e))?;
    let rows = match document {
        LeaderboardDocument::Rows(rows) => rows,
        LeaderboardDocument::Table { leaderboard_table } => leaderboard_table,
    };
    Ok(rows
        .into_iter()
        .map(|row| serde_json::from_value::<ArenaRow>(row).map_err(TrackerError::from))
        .collect())
}

/// Store the rows of one result file under its snapshot date.
pub fn apply_rankings(
    store: &SnapshotStore,
    snapshot_date: NaiveDate,
    rows: Vec<Result<ArenaRow>>,
) -> IngestReport {
    let mut report = IngestReport::new(IngestSource::Arena);
    for (index, row) in rows.into_iter().enumerate() {
        match row {
            Ok(row) => {
                let outcome = row.elo_score().and_then(|score| {
                    store.upsert_arena_ranking(snapshot_date, &row.model, row.final_ranking, score)
                });
                report.record(&row.model, outcome);
            }
            Err(e) => report.record(&format!("row #{}", index), Err(e)),
        }
    }
    report
}

/// Crawler for the leaderboard Space.
pub struct ArenaCrawler {
    client: Arc<HttpClient>,
    api_base: String,
    resolve_base: String,
    space_id: String,
    max_files: usize,
}

impl ArenaCrawler {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            api_base: HubConfig::API_BASE.to_string(),
            resolve_base: ArenaConfig::RESOLVE_BASE.to_string(),
            space_id: ArenaConfig::SPACE_ID.to_string(),
            max_files: ArenaConfig::MAX_FILES_PER_RUN,
        }
    }

    pub fn with_space_id(mut self, space_id: impl Into<String>) -> Self {
        self.space_id = space_id.into();
        self
    }

    /// List the dated result files currently published in the Space.
    pub async fn list_files(&self) -> Result<Vec<LeaderboardFile>> {
        let url = format!("{}/spaces/{}", self.api_base, self.space_id);
        let info: SpaceInfo = self.client.get_json(&url, &[]).await?;
        Ok(leaderboard_files(
            info.siblings.into_iter().map(|s| s.rfilename),
        ))
    }

    /// Download and decode one result file.
    pub async fn fetch_file(&self, file: &LeaderboardFile) -> Result<Vec<Result<ArenaRow>>> {
        let url = format!(
            "{}/{}/resolve/main/{}",
            self.resolve_base,
            self.space_id,
            urlencoding::encode(&file.filename)
        );
        let body = self.client.get_text(&url, &[]).await?;
        parse_leaderboard(&body)
    }
}

#[async_trait]
impl Crawler for ArenaCrawler {
    fn source(&self) -> IngestSource {
        IngestSource::Arena
    }

    async fn crawl(&self, store: &SnapshotStore, _today: NaiveDate) -> Result<IngestReport> {
        let mut report = IngestReport::new(IngestSource::Arena);

        info!("Listing leaderboard result files in {} ...", self.space_id);
        let files = self.list_files().await?;
        let Some(latest) = files.last() else {
            warn!("No leaderboard result files found in {}", self.space_id);
            return Ok(report);
        };
        info!("Found {} result files. Latest: {}", files.len(), latest.filename);

        let imported = store.imported_arena_dates(ArenaConfig::IMPORTED_DATES_LOOKBACK)?;
        info!("Already imported: {} snapshot dates", imported.len());

        let new_files = select_new_files(&files, &imported, self.max_files);
        if new_files.is_empty() {
            info!("No new leaderboard result files to import");
            return Ok(report);
        }

        for file in &new_files {
            info!(
                "Processing {} (snapshot_date={}) ...",
                file.filename, file.snapshot_date
            );
            let rows = match self.fetch_file(file).await {
                Ok(rows) if !rows.is_empty() => rows,
                Ok(_) => {
                    warn!("  No rows in {}, skipping", file.filename);
                    continue;
                }
                Err(e) => {
                    warn!("  Failed to read {}: {}", file.filename, e);
                    continue;
                }
            };
            info!("  Extracted {} model rankings", rows.len());
            let file_report = apply_rankings(store, file.snapshot_date, rows);
            info!("  Upserted: ok={}, err={}", file_report.ok, file_report.errors);
            report.merge(&file_report);
        }

        report.log_summary();
        Ok(report)
    }
}
