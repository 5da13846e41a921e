//! Validated parameters for the read queries.
//!
//! Out-of-range values are rejected, never clamped, and rejection happens
//! before any SQL runs.

use crate::config::{is_known_category, is_known_pipeline_tag, Bounds, QueryLimits};
use crate::{Result, TrackerError};
use chrono::NaiveDate;

/// Resolve an optional numeric parameter against its bounds.
pub fn bounded(field: &str, value: Option<i64>, bounds: Bounds) -> Result<u32> {
    let value = match value {
        Some(v) => v,
        None => return Ok(bounds.default),
    };
    if value < i64::from(bounds.min) || value > i64::from(bounds.max) {
        return Err(TrackerError::validation(
            field,
            format!(
                "must be between {} and {}, got {}",
                bounds.min, bounds.max, value
            ),
        ));
    }
    Ok(value as u32)
}

/// Parse an ISO `YYYY-MM-DD` calendar date.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        TrackerError::validation(field, format!("expected YYYY-MM-DD, got '{}'", value))
    })
}

fn pipeline_tag_filter(value: Option<String>) -> Result<Option<String>> {
    match value {
        Some(tag) if !is_known_pipeline_tag(&tag) => Err(TrackerError::validation(
            "pipeline_tag",
            format!("unknown pipeline tag '{}'", tag),
        )),
        other => Ok(other),
    }
}

fn category_filter(value: Option<String>) -> Result<Option<String>> {
    match value {
        Some(category) if !is_known_category(&category) => Err(TrackerError::validation(
            "category",
            format!("unknown category '{}'", category),
        )),
        other => Ok(other),
    }
}

/// Parameters of the trending-models query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendingQuery {
    pub pipeline_tag: Option<String>,
    pub days: u32,
    pub limit: u32,
}

impl TrendingQuery {
    pub fn new(pipeline_tag: Option<String>, days: Option<i64>, limit: Option<i64>) -> Result<Self> {
        Ok(Self {
            pipeline_tag: pipeline_tag_filter(pipeline_tag)?,
            days: bounded("days", days, QueryLimits::DAYS)?,
            limit: bounded("limit", limit, QueryLimits::LIMIT)?,
        })
    }
}

impl Default for TrendingQuery {
    fn default() -> Self {
        Self {
            pipeline_tag: None,
            days: QueryLimits::DAYS.default,
            limit: QueryLimits::LIMIT.default,
        }
    }
}

/// Parameters of the newly-seen-models query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewModelsQuery {
    pub pipeline_tag: Option<String>,
    pub days: u32,
    pub limit: u32,
}

impl NewModelsQuery {
    pub fn new(pipeline_tag: Option<String>, days: Option<i64>, limit: Option<i64>) -> Result<Self> {
        Ok(Self {
            pipeline_tag: pipeline_tag_filter(pipeline_tag)?,
            days: bounded("days", days, QueryLimits::DAYS)?,
            limit: bounded("limit", limit, QueryLimits::LIMIT)?,
        })
    }
}

/// Parameters of the per-model history query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub model_id: String,
    pub limit: u32,
}

impl HistoryQuery {
    pub fn new(model_id: impl Into<String>, limit: Option<i64>) -> Result<Self> {
        let model_id = model_id.into();
        if model_id.trim().is_empty() {
            return Err(TrackerError::validation("model_id", "must not be empty"));
        }
        Ok(Self {
            model_id,
            limit: bounded("limit", limit, QueryLimits::HISTORY_LIMIT)?,
        })
    }
}

/// Parameters of the leaderboard query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingsQuery {
    /// Exact date to read; `None` means the latest date present.
    pub snapshot_date: Option<NaiveDate>,
    pub limit: u32,
}

impl RankingsQuery {
    pub fn new(snapshot_date: Option<&str>, limit: Option<i64>) -> Result<Self> {
        Ok(Self {
            snapshot_date: snapshot_date
                .map(|d| parse_date("snapshot_date", d))
                .transpose()?,
            limit: bounded("limit", limit, QueryLimits::ARENA_LIMIT)?,
        })
    }
}

/// Parameters of the recent-papers query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentPapersQuery {
    pub category: Option<String>,
    pub days: u32,
    pub limit: u32,
}

impl RecentPapersQuery {
    pub fn new(category: Option<String>, days: Option<i64>, limit: Option<i64>) -> Result<Self> {
        Ok(Self {
            category: category_filter(category)?,
            days: bounded("days", days, QueryLimits::DAYS)?,
            limit: bounded("limit", limit, QueryLimits::LIMIT)?,
        })
    }
}
