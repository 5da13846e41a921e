//! Model hub crawler.
//!
//! Lists the most-liked models for each tracked pipeline tag and records a
//! snapshot per model for the current day.

use super::{Crawler, IngestReport, IngestSource};
use crate::config::HubConfig;
use crate::network::HttpClient;
use crate::store::{SnapshotMetrics, SnapshotStore};
use crate::{Result, TrackerError};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

/// One entry of the hub's model listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HubModelEntry {
    #[serde(rename = "modelId")]
    pub model_id: Option<String>,
    pub id: Option<String>,
    pub likes: Option<i64>,
    /// Trailing 30-day download count.
    pub downloads: Option<i64>,
    pub pipeline_tag: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl HubModelEntry {
    /// Repository id (`author/name`), whichever field the API filled in.
    pub fn repo_id(&self) -> Option<&str> {
        self.model_id
            .as_deref()
            .or(self.id.as_deref())
            .filter(|id| !id.trim().is_empty())
    }
}

/// Split `author/name` into display name and author.
pub fn split_repo_id(repo_id: &str) -> (&str, Option<&str>) {
    match repo_id.split_once('/') {
        Some((author, _)) => {
            let name = repo_id.rsplit('/').next().unwrap_or(repo_id);
            (name, Some(author))
        }
        None => (repo_id, None),
    }
}

/// Decode a listing payload entry by entry, so one malformed entry does not
/// discard the page.
pub fn decode_listing(payload: Vec<serde_json::Value>) -> Vec<Result<HubModelEntry>> {
    payload
        .into_iter()
        .map(|value| serde_json::from_value::<HubModelEntry>(value).map_err(TrackerError::from))
        .collect()
}

/// Write one listing into the store as of `today`.
pub fn apply_listing(
    store: &SnapshotStore,
    entries: Vec<Result<HubModelEntry>>,
    today: NaiveDate,
) -> IngestReport {
    let mut report = IngestReport::new(IngestSource::Hub);
    for (index, entry) in entries.into_iter().enumerate() {
        let key = entry
            .as_ref()
            .ok()
            .and_then(|e| e.repo_id())
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", index));
        let outcome = entry.and_then(|entry| apply_entry(store, &entry, today));
        report.record(&key, outcome);
    }
    report
}

fn apply_entry(store: &SnapshotStore, entry: &HubModelEntry, today: NaiveDate) -> Result<()> {
    let repo_id = entry
        .repo_id()
        .ok_or_else(|| TrackerError::parse("hub model entry", "missing model id"))?;
    let (name, author) = split_repo_id(repo_id);

    store.upsert_model(repo_id, name, author, entry.pipeline_tag.as_deref())?;
    store.upsert_snapshot(
        repo_id,
        today,
        &SnapshotMetrics {
            downloads_30d: entry.downloads,
            likes: entry.likes.unwrap_or(0),
            pipeline_tag: entry.pipeline_tag.clone(),
            tags: entry.tags.clone(),
            // Scored later by a separate enrichment pass.
            business_score: None,
            business_summary: None,
        },
    )
}

/// Crawler for the model hub listing API.
pub struct HubCrawler {
    client: Arc<HttpClient>,
    api_base: String,
    pipeline_tags: Vec<String>,
    limit_per_tag: u32,
    pause: std::time::Duration,
}

impl HubCrawler {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            api_base: HubConfig::API_BASE.to_string(),
            pipeline_tags: HubConfig::TARGET_PIPELINE_TAGS
                .iter()
                .map(|t| t.to_string())
                .collect(),
            limit_per_tag: HubConfig::LIMIT_PER_TAG,
            pause: HubConfig::PAUSE_BETWEEN_TAGS,
        }
    }

    /// Point the crawler at a different API root (mirrors, tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Restrict or replace the crawled pipeline tags.
    pub fn with_pipeline_tags(mut self, tags: Vec<String>) -> Self {
        self.pipeline_tags = tags;
        self
    }

    /// Fetch the most-liked models for one pipeline tag.
    pub async fn fetch_listing(&self, pipeline_tag: &str) -> Result<Vec<serde_json::Value>> {
        let url = format!("{}/models", self.api_base);
        let query = [
            ("pipeline_tag", pipeline_tag.to_string()),
            ("sort", "likes".to_string()),
            ("direction", "-1".to_string()),
            ("limit", self.limit_per_tag.to_string()),
            ("cardData", "false".to_string()),
            ("full", "false".to_string()),
        ];
        self.client.get_json(&url, &query).await
    }
}

#[async_trait]
impl Crawler for HubCrawler {
    fn source(&self) -> IngestSource {
        IngestSource::Hub
    }

    async fn crawl(&self, store: &SnapshotStore, today: NaiveDate) -> Result<IngestReport> {
        let mut report = IngestReport::new(IngestSource::Hub);

        for (i, tag) in self.pipeline_tags.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pause).await;
            }
            info!("Fetching tag={} ...", tag);
            let payload = match self.fetch_listing(tag).await {
                Ok(payload) => payload,
                Err(e) => {
                    error!("Hub API fetch failed for {}: {}", tag, e);
                    continue;
                }
            };
            info!("  Got {} models", payload.len());
            report.merge(&apply_listing(store, decode_listing(payload), today));
        }

        report.log_summary();
        Ok(report)
    }
}
