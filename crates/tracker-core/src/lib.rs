//! Tracker Core - Headless library behind the AI model tracker.
//!
//! Keeps a daily-snapshot record of popular open models, preprints and crowd
//! leaderboard standings, and answers the read queries the dashboard needs
//! (trending by likes growth, newly seen models, per-model history, latest
//! leaderboard, recent papers). It can be used without the HTTP layer.
//!
//! # Example
//!
//! ```rust,ignore
//! use tracker_core::{QueryEngine, SnapshotStore, TrendingQuery};
//!
//! fn main() -> tracker_core::Result<()> {
//!     let store = SnapshotStore::open("model-tracker.db")?;
//!     let engine = QueryEngine::new(store);
//!
//!     let today = chrono::Utc::now().date_naive();
//!     let query = TrendingQuery::new(Some("text-generation".into()), Some(7), Some(20))?;
//!     for model in engine.trending(&query, today)? {
//!         println!("{} +{}", model.model_id, model.likes_delta);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod ingest;
pub mod network;
pub mod query;
pub mod store;

// Re-export commonly used types
pub use error::{Result, TrackerError};
pub use ingest::{ArenaCrawler, ArxivCrawler, Crawler, HubCrawler, IngestReport, IngestSource};
pub use network::HttpClient;
pub use query::{
    HistoryQuery, NewModel, NewModelsQuery, QueryEngine, RankingsQuery, RecentPapersQuery,
    SnapshotPoint, TrendingModel, TrendingQuery,
};
pub use store::{
    ArenaRankingRecord, ModelRecord, PaperFields, PaperRecord, SnapshotMetrics, SnapshotStore,
    StoreCounts,
};
