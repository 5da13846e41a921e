//! Rows returned by the read queries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A model ranked by like growth over a lookback window.
///
/// The date span actually used can be narrower than the requested window
/// when snapshots are sparse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingModel {
    pub model_id: String,
    pub pipeline_tag: Option<String>,
    pub likes_latest: i64,
    pub likes_delta: i64,
    pub snapshot_date_from: NaiveDate,
    pub snapshot_date_to: NaiveDate,
}

/// A model first observed within a lookback window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewModel {
    pub id: String,
    pub name: String,
    pub author: Option<String>,
    pub pipeline_tag: Option<String>,
    pub first_seen_at: DateTime<Utc>,
}

/// One dated point of a model's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPoint {
    pub snapshot_date: NaiveDate,
    pub downloads_30d: Option<i64>,
    pub likes: i64,
    pub pipeline_tag: Option<String>,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_summary: Option<String>,
}
