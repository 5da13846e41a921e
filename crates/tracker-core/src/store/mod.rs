//! Snapshot store: model registry, dated model snapshots, papers and
//! leaderboard rows in SQLite.
//!
//! This module provides:
//! - Schema and index management
//! - Upsert contracts used by the ingestion adapters
//! - Column codecs shared with the query engine

mod schema;
mod snapshot_store;
mod types;

pub use snapshot_store::SnapshotStore;
pub use types::{
    ArenaRankingRecord, ModelRecord, PaperFields, PaperRecord, SnapshotMetrics, StoreCounts,
};

pub(crate) use snapshot_store::{
    date_column, format_date, format_timestamp, opt_timestamp_column, row_to_arena_ranking,
    row_to_paper, string_list_column, timestamp_column,
};
