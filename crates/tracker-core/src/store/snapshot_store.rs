//! SQLite-backed snapshot store.
//!
//! Holds the model registry, the dated per-model snapshots, papers and
//! leaderboard rows. Every write is a single upsert statement, so each row
//! is written atomically and re-running an ingestion for the same day
//! overwrites instead of duplicating.

use super::schema::{configure_connection, ensure_schema};
use super::types::{
    ArenaRankingRecord, ModelRecord, PaperFields, PaperRecord, SnapshotMetrics, StoreCounts,
};
use crate::{Result, TrackerError};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Snapshot store over a single SQLite database.
///
/// Cloning is cheap; clones share the underlying connection.
#[derive(Clone)]
pub struct SnapshotStore {
    db_path: Option<PathBuf>,
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}

impl SnapshotStore {
    /// Create or open a store at the given path.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| TrackerError::Io {
                    message: format!("Failed to create directory {}", parent.display()),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(&db_path)?;
        Self::from_connection(conn, Some(db_path))
    }

    /// Open a private in-memory store. Data is lost when the last clone drops.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        configure_connection(&conn)?;
        ensure_schema(&conn)?;
        Ok(Self {
            db_path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Database path, or `None` for in-memory stores.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| TrackerError::Database {
            message: "Failed to acquire connection lock".to_string(),
            source: None,
        })
    }

    // ------------------------------------------------------------------
    // Models
    // ------------------------------------------------------------------

    /// Register a model, or refresh its mutable fields if already known.
    ///
    /// The first-seen time is the current UTC time on creation.
    pub fn upsert_model(
        &self,
        id: &str,
        name: &str,
        author: Option<&str>,
        pipeline_tag: Option<&str>,
    ) -> Result<()> {
        self.upsert_model_at(id, name, author, pipeline_tag, Utc::now())
    }

    /// Same as [`upsert_model`](Self::upsert_model) with an explicit
    /// observation time. `seen_at` only matters when the row is created;
    /// `first_seen_at` is never overwritten.
    pub fn upsert_model_at(
        &self,
        id: &str,
        name: &str,
        author: Option<&str>,
        pipeline_tag: Option<&str>,
        seen_at: DateTime<Utc>,
    ) -> Result<()> {
        if id.trim().is_empty() {
            return Err(TrackerError::validation("id", "model id must not be empty"));
        }
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO models (id, name, author, pipeline_tag, first_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 name=excluded.name,
                 author=excluded.author,
                 pipeline_tag=excluded.pipeline_tag",
            params![id, name, author, pipeline_tag, format_timestamp(&seen_at)],
        )?;
        debug!("Upserted model: {}", id);
        Ok(())
    }

    /// Set the linked paper and/or benchmark id of a model.
    ///
    /// `None` leaves the stored value as it is.
    pub fn link_model(
        &self,
        id: &str,
        paper_id: Option<&str>,
        benchmark_id: Option<&str>,
    ) -> Result<()> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE models SET
                 paper_id=COALESCE(?2, paper_id),
                 benchmark_id=COALESCE(?3, benchmark_id)
             WHERE id=?1",
            params![id, paper_id, benchmark_id],
        )?;
        if rows == 0 {
            return Err(TrackerError::ModelNotFound {
                model_id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Get a model by id.
    pub fn get_model(&self, id: &str) -> Result<Option<ModelRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT id, name, author, pipeline_tag, first_seen_at, paper_id, benchmark_id
                 FROM models WHERE id = ?1",
                params![id],
                row_to_model,
            )
            .optional()?;
        Ok(record)
    }

    /// Delete a model together with all of its snapshots.
    pub fn delete_model(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM models WHERE id = ?1", params![id])?;
        if rows > 0 {
            debug!("Deleted model: {}", id);
        }
        Ok(rows > 0)
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Insert or replace the snapshot of `model_id` for `date`.
    ///
    /// Fails with [`TrackerError::Integrity`] if the model is not registered.
    pub fn upsert_snapshot(
        &self,
        model_id: &str,
        date: NaiveDate,
        metrics: &SnapshotMetrics,
    ) -> Result<()> {
        let tags_json = serde_json::to_string(&metrics.tags)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO model_snapshots (model_id, snapshot_date, downloads_30d, likes,
                                          pipeline_tag, tags_json, business_score, business_summary)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(model_id, snapshot_date) DO UPDATE SET
                 downloads_30d=excluded.downloads_30d,
                 likes=excluded.likes,
                 pipeline_tag=excluded.pipeline_tag,
                 tags_json=excluded.tags_json,
                 business_score=excluded.business_score,
                 business_summary=excluded.business_summary",
            params![
                model_id,
                format_date(date),
                metrics.downloads_30d,
                metrics.likes,
                metrics.pipeline_tag,
                tags_json,
                metrics.business_score,
                metrics.business_summary,
            ],
        )?;
        debug!("Upserted snapshot: {} @ {}", model_id, date);
        Ok(())
    }

    /// Number of snapshots stored for a model.
    pub fn snapshot_count(&self, model_id: &str) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM model_snapshots WHERE model_id = ?1",
            params![model_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ------------------------------------------------------------------
    // Papers
    // ------------------------------------------------------------------

    /// Insert a paper, or fill in fields that are still unset.
    ///
    /// Populated fields are never overwritten; the SOTA flag only moves from
    /// unset to set.
    pub fn upsert_paper(&self, arxiv_id: &str, fields: &PaperFields) -> Result<()> {
        if arxiv_id.trim().is_empty() {
            return Err(TrackerError::validation("arxiv_id", "paper id must not be empty"));
        }
        let authors_json = match &fields.authors {
            Some(authors) if !authors.is_empty() => Some(serde_json::to_string(authors)?),
            _ => None,
        };
        let submitted_at = fields.submitted_at.as_ref().map(format_timestamp);
        let sota = fields.pwc_sota_flag.map(i64::from);

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO papers (arxiv_id, title, abstract, submitted_at, authors_json,
                                 category, pwc_sota_flag)
             VALUES (?1, ?2, ?3, ?4, COALESCE(?5, '[]'), ?6, COALESCE(?7, 0))
             ON CONFLICT(arxiv_id) DO UPDATE SET
                 title=COALESCE(papers.title, excluded.title),
                 abstract=COALESCE(papers.abstract, excluded.abstract),
                 submitted_at=COALESCE(papers.submitted_at, excluded.submitted_at),
                 authors_json=CASE WHEN papers.authors_json = '[]'
                                   THEN excluded.authors_json
                                   ELSE papers.authors_json END,
                 category=COALESCE(papers.category, excluded.category),
                 pwc_sota_flag=MAX(papers.pwc_sota_flag, excluded.pwc_sota_flag)",
            params![
                arxiv_id,
                fields.title,
                fields.abstract_text,
                submitted_at,
                authors_json,
                fields.category,
                sota,
            ],
        )?;
        debug!("Upserted paper: {}", arxiv_id);
        Ok(())
    }

    /// Get a paper by arXiv id.
    pub fn get_paper(&self, arxiv_id: &str) -> Result<Option<PaperRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT arxiv_id, title, abstract, submitted_at, authors_json, category, pwc_sota_flag
                 FROM papers WHERE arxiv_id = ?1",
                params![arxiv_id],
                row_to_paper,
            )
            .optional()?;
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Arena rankings
    // ------------------------------------------------------------------

    /// Insert or replace the leaderboard row for (`date`, `model_name`).
    pub fn upsert_arena_ranking(
        &self,
        date: NaiveDate,
        model_name: &str,
        rank: i64,
        elo_score: i64,
    ) -> Result<()> {
        if model_name.trim().is_empty() {
            return Err(TrackerError::validation(
                "model_name",
                "leaderboard model name must not be empty",
            ));
        }
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO arena_rankings (snapshot_date, model_name, rank, elo_score)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(snapshot_date, model_name) DO UPDATE SET
                 rank=excluded.rank,
                 elo_score=excluded.elo_score",
            params![format_date(date), model_name, rank, elo_score],
        )?;
        Ok(())
    }

    /// Most recent leaderboard dates already present, newest first.
    pub fn imported_arena_dates(&self, lookback: usize) -> Result<BTreeSet<NaiveDate>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT snapshot_date FROM arena_rankings
             ORDER BY snapshot_date DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![lookback as i64], |row| date_column(row, 0))?;
        let mut dates = BTreeSet::new();
        for row in rows {
            dates.insert(row?);
        }
        Ok(dates)
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Row counts per table.
    pub fn counts(&self) -> Result<StoreCounts> {
        let conn = self.lock()?;
        let count = |table: &str| -> Result<u64> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(n as u64)
        };
        Ok(StoreCounts {
            models: count("models")?,
            model_snapshots: count("model_snapshots")?,
            papers: count("papers")?,
            arena_rankings: count("arena_rankings")?,
        })
    }
}

// ----------------------------------------------------------------------
// Column codecs
// ----------------------------------------------------------------------

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|e| conversion_error(idx, e))
}

pub(crate) fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_timestamp_column(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        DateTime::parse_from_rfc3339(&t)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

pub(crate) fn string_list_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(idx, e))
}

fn row_to_model(row: &Row<'_>) -> rusqlite::Result<ModelRecord> {
    Ok(ModelRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        author: row.get(2)?,
        pipeline_tag: row.get(3)?,
        first_seen_at: timestamp_column(row, 4)?,
        paper_id: row.get(5)?,
        benchmark_id: row.get(6)?,
    })
}

pub(crate) fn row_to_paper(row: &Row<'_>) -> rusqlite::Result<PaperRecord> {
    let sota: i64 = row.get(6)?;
    Ok(PaperRecord {
        arxiv_id: row.get(0)?,
        title: row.get(1)?,
        abstract_text: row.get(2)?,
        submitted_at: opt_timestamp_column(row, 3)?,
        authors: string_list_column(row, 4)?,
        category: row.get(5)?,
        pwc_sota_flag: sota != 0,
    })
}

pub(crate) fn row_to_arena_ranking(row: &Row<'_>) -> rusqlite::Result<ArenaRankingRecord> {
    Ok(ArenaRankingRecord {
        snapshot_date: date_column(row, 0)?,
        model_name: row.get(1)?,
        rank: row.get(2)?,
        elo_score: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn create_test_store() -> (SnapshotStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::open(temp_dir.path().join("tracker.db")).unwrap();
        (store, temp_dir)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn metrics(likes: i64) -> SnapshotMetrics {
        SnapshotMetrics {
            downloads_30d: Some(likes * 10),
            likes,
            pipeline_tag: Some("text-generation".to_string()),
            tags: vec!["transformers".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_upsert_model_keeps_first_seen() {
        let (store, _temp) = create_test_store();
        let first = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 2, 20, 8, 0, 0).unwrap();

        store
            .upsert_model_at("acme/llm-7b", "llm-7b", Some("acme"), Some("text-generation"), first)
            .unwrap();
        store
            .upsert_model_at("acme/llm-7b", "LLM 7B", Some("acme"), Some("text2text-generation"), later)
            .unwrap();

        let model = store.get_model("acme/llm-7b").unwrap().unwrap();
        assert_eq!(model.first_seen_at, first);
        assert_eq!(model.name, "LLM 7B");
        assert_eq!(model.pipeline_tag.as_deref(), Some("text2text-generation"));
    }

    #[test]
    fn test_link_model() {
        let (store, _temp) = create_test_store();
        store.upsert_model("acme/m", "m", Some("acme"), None).unwrap();

        store.link_model("acme/m", Some("2401.00001"), None).unwrap();
        store.link_model("acme/m", None, Some("mmlu")).unwrap();

        let model = store.get_model("acme/m").unwrap().unwrap();
        assert_eq!(model.paper_id.as_deref(), Some("2401.00001"));
        assert_eq!(model.benchmark_id.as_deref(), Some("mmlu"));

        let err = store.link_model("nobody/none", Some("x"), None).unwrap_err();
        assert!(matches!(err, TrackerError::ModelNotFound { .. }));
    }

    #[test]
    fn test_snapshot_upsert_same_day_overwrites() {
        let (store, _temp) = create_test_store();
        store.upsert_model("acme/m", "m", Some("acme"), None).unwrap();

        store
            .upsert_snapshot("acme/m", date("2026-02-26"), &metrics(100))
            .unwrap();
        store
            .upsert_snapshot("acme/m", date("2026-02-26"), &metrics(150))
            .unwrap();

        assert_eq!(store.snapshot_count("acme/m").unwrap(), 1);
        let conn = store.lock().unwrap();
        let likes: i64 = conn
            .query_row(
                "SELECT likes FROM model_snapshots WHERE model_id = 'acme/m'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(likes, 150);
    }

    #[test]
    fn test_snapshot_for_unknown_model_is_integrity_error() {
        let (store, _temp) = create_test_store();
        let err = store
            .upsert_snapshot("ghost/model", date("2026-02-26"), &metrics(1))
            .unwrap_err();
        assert!(matches!(err, TrackerError::Integrity { .. }), "got {err:?}");
        assert_eq!(store.counts().unwrap().model_snapshots, 0);
    }

    #[test]
    fn test_delete_model_cascades_to_snapshots() {
        let (store, _temp) = create_test_store();
        store.upsert_model("acme/m", "m", Some("acme"), None).unwrap();
        store
            .upsert_snapshot("acme/m", date("2026-02-25"), &metrics(1))
            .unwrap();
        store
            .upsert_snapshot("acme/m", date("2026-02-26"), &metrics(2))
            .unwrap();

        assert!(store.delete_model("acme/m").unwrap());
        assert_eq!(store.snapshot_count("acme/m").unwrap(), 0);
        assert!(!store.delete_model("acme/m").unwrap());
    }

    #[test]
    fn test_paper_upsert_only_fills_unset_fields() {
        let (store, _temp) = create_test_store();
        let submitted = Utc.with_ymd_and_hms(2026, 2, 20, 12, 0, 0).unwrap();

        store
            .upsert_paper(
                "2602.01234",
                &PaperFields {
                    title: Some("Scaling Things".into()),
                    abstract_text: Some("We scale.".into()),
                    submitted_at: Some(submitted),
                    authors: Some(vec!["A. Author".into()]),
                    category: None,
                    pwc_sota_flag: None,
                },
            )
            .unwrap();

        // Backfill category and flag; a different title must not win.
        store
            .upsert_paper(
                "2602.01234",
                &PaperFields {
                    title: Some("Other Title".into()),
                    category: Some("cs.LG".into()),
                    pwc_sota_flag: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();

        // A later run without category must not clear it.
        store
            .upsert_paper(
                "2602.01234",
                &PaperFields {
                    pwc_sota_flag: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();

        let paper = store.get_paper("2602.01234").unwrap().unwrap();
        assert_eq!(paper.title.as_deref(), Some("Scaling Things"));
        assert_eq!(paper.category.as_deref(), Some("cs.LG"));
        assert_eq!(paper.authors, vec!["A. Author".to_string()]);
        assert_eq!(paper.submitted_at, Some(submitted));
        assert!(paper.pwc_sota_flag);
        assert_eq!(store.counts().unwrap().papers, 1);
    }

    #[test]
    fn test_arena_upsert_replaces_by_date_and_name() {
        let (store, _temp) = create_test_store();
        let d = date("2026-01-15");
        store.upsert_arena_ranking(d, "gpt-x", 2, 1280).unwrap();
        store.upsert_arena_ranking(d, "gpt-x", 1, 1301).unwrap();
        store
            .upsert_arena_ranking(date("2026-02-01"), "gpt-x", 1, 1310)
            .unwrap();

        assert_eq!(store.counts().unwrap().arena_rankings, 2);
        let dates = store.imported_arena_dates(10).unwrap();
        assert!(dates.contains(&d));
        assert!(dates.contains(&date("2026-02-01")));
    }

    #[test]
    fn test_reopen_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("tracker.db");
        {
            let store = SnapshotStore::open(&path).unwrap();
            store.upsert_model("acme/m", "m", None, None).unwrap();
        }
        let store = SnapshotStore::open(&path).unwrap();
        assert_eq!(store.db_path(), Some(path.as_path()));
        assert!(store.get_model("acme/m").unwrap().is_some());
    }
}
