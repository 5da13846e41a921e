//! Ingestion adapters for the three upstream sources.
//!
//! Each adapter has a network half (fetch and decode) and a store half
//! (apply records one by one). A bad record is logged and counted, never
//! allowed to abort the rest of the batch, so a crawl can be re-run
//! wholesale the next day.
//!
//! # Module Organization
//!
//! - [`hub`] - Model hub listing per pipeline tag → models + daily snapshots
//! - [`arxiv`] - Preprint Atom feed per category → papers
//! - [`arena`] - Crowd leaderboard result files → arena rankings

pub mod arena;
pub mod arxiv;
pub mod hub;

pub use arena::ArenaCrawler;
pub use arxiv::ArxivCrawler;
pub use hub::HubCrawler;

use crate::config::IngestConfig;
use crate::store::SnapshotStore;
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// Upstream source identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestSource {
    Hub,
    Arxiv,
    Arena,
}

impl IngestSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestSource::Hub => "hub",
            IngestSource::Arxiv => "arxiv",
            IngestSource::Arena => "arena",
        }
    }
}

impl fmt::Display for IngestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome counters of one crawl run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub source: IngestSource,
    pub ok: usize,
    pub errors: usize,
}

impl IngestReport {
    pub fn new(source: IngestSource) -> Self {
        Self {
            source,
            ok: 0,
            errors: 0,
        }
    }

    /// Count the outcome of one record, logging failures.
    pub fn record(&mut self, key: &str, outcome: Result<()>) {
        match outcome {
            Ok(()) => self.ok += 1,
            Err(e) => {
                warn!("  Failed to ingest {} record {}: {}", self.source, key, e);
                self.errors += 1;
            }
        }
    }

    /// Fold another report of the same source into this one.
    pub fn merge(&mut self, other: &IngestReport) {
        self.ok += other.ok;
        self.errors += other.errors;
    }

    pub fn processed(&self) -> usize {
        self.ok + self.errors
    }

    /// Fraction of processed records that failed; 0 when nothing ran.
    pub fn error_rate(&self) -> f64 {
        match self.processed() {
            0 => 0.0,
            n => self.errors as f64 / n as f64,
        }
    }

    /// Whether the run failed badly enough to alert on.
    pub fn exceeds_threshold(&self) -> bool {
        self.error_rate() > IngestConfig::ERROR_RATE_THRESHOLD
    }

    /// Log the end-of-run summary line.
    pub fn log_summary(&self) {
        info!(
            "Crawl complete: source={}, ok={}, errors={}, error_rate={:.1}%",
            self.source,
            self.ok,
            self.errors,
            self.error_rate() * 100.0
        );
    }
}

/// A daily crawl job for one upstream source.
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Which source this crawler reads.
    fn source(&self) -> IngestSource;

    /// Fetch from upstream and write into the store for `today`.
    ///
    /// Only failures that prevent the whole run (e.g. an unusable store)
    /// are returned as errors; per-record failures are counted in the
    /// report.
    async fn crawl(&self, store: &SnapshotStore, today: NaiveDate) -> Result<IngestReport>;
}
