//! Query engine: trending, newly-seen, history, leaderboard and recent-paper
//! lookups over the snapshot store.

mod engine;
mod params;
mod types;

pub use engine::QueryEngine;
pub use params::{
    bounded, parse_date, HistoryQuery, NewModelsQuery, RankingsQuery, RecentPapersQuery,
    TrendingQuery,
};
pub use types::{NewModel, SnapshotPoint, TrendingModel};
