//! Records written to and read from the snapshot store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A row of the model registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: String,
    pub name: String,
    pub author: Option<String>,
    pub pipeline_tag: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub paper_id: Option<String>,
    pub benchmark_id: Option<String>,
}

/// Metrics observed for a model on one calendar day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetrics {
    /// Trailing 30-day downloads as reported upstream; absent for some repos.
    pub downloads_30d: Option<i64>,
    pub likes: i64,
    pub pipeline_tag: Option<String>,
    pub tags: Vec<String>,
    pub business_score: Option<f64>,
    pub business_summary: Option<String>,
}

/// Paper fields supplied by an ingestion run.
///
/// `None` fields are left untouched on an existing row and only fill in
/// values that are still unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperFields {
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub authors: Option<Vec<String>>,
    pub category: Option<String>,
    pub pwc_sota_flag: Option<bool>,
}

/// A stored paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub arxiv_id: String,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub authors: Vec<String>,
    pub category: Option<String>,
    pub pwc_sota_flag: bool,
}

/// One leaderboard row for one observation date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaRankingRecord {
    pub snapshot_date: NaiveDate,
    pub model_name: String,
    pub rank: i64,
    pub elo_score: i64,
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub models: u64,
    pub model_snapshots: u64,
    pub papers: u64,
    pub arena_rankings: u64,
}
