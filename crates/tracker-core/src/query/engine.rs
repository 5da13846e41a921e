//! Read-only queries over the snapshot store.
//!
//! Every query takes `today` explicitly so results are a pure function of
//! the stored rows and the calendar date. Nothing is cached between calls;
//! the latest leaderboard date is resolved per request.

use super::params::{HistoryQuery, NewModelsQuery, RankingsQuery, RecentPapersQuery, TrendingQuery};
use super::types::{NewModel, SnapshotPoint, TrendingModel};
use crate::store::{
    date_column, format_date, row_to_arena_ranking, row_to_paper, string_list_column,
    timestamp_column, ArenaRankingRecord, PaperRecord, SnapshotStore,
};
use crate::Result;
use chrono::{Days, NaiveDate};
use rusqlite::{params, OptionalExtension};
use tracing::debug;

/// Snapshots in the window are numbered from both ends per model; the first
/// and last rows are joined to get the delta. Models with a single snapshot
/// in the window have no delta and drop out.
const TRENDING_SQL: &str = "
WITH windowed AS (
    SELECT model_id, snapshot_date, likes, pipeline_tag,
           ROW_NUMBER() OVER (PARTITION BY model_id ORDER BY snapshot_date ASC) AS rn_first,
           ROW_NUMBER() OVER (PARTITION BY model_id ORDER BY snapshot_date DESC) AS rn_last,
           COUNT(*) OVER (PARTITION BY model_id) AS n
    FROM model_snapshots
    WHERE snapshot_date >= ?1
      AND snapshot_date <= ?2
      AND (?3 IS NULL OR pipeline_tag = ?3)
)
SELECT l.model_id, l.pipeline_tag, l.likes, l.likes - f.likes AS likes_delta,
       f.snapshot_date, l.snapshot_date
FROM windowed f
JOIN windowed l ON l.model_id = f.model_id AND l.rn_last = 1
WHERE f.rn_first = 1 AND f.n >= 2
ORDER BY likes_delta DESC, l.likes DESC, l.model_id ASC
LIMIT ?4";

/// Query engine over a [`SnapshotStore`].
#[derive(Debug, Clone)]
pub struct QueryEngine {
    store: SnapshotStore,
}

/// First day of a trailing window of `days` days ending at `today`.
fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today - Days::new(u64::from(days))
}

/// Exclusive upper bound for timestamps that fall on or before `today`.
fn day_after(today: NaiveDate) -> NaiveDate {
    today + Days::new(1)
}

impl QueryEngine {
    pub fn new(store: SnapshotStore) -> Self {
        Self { store }
    }

    /// The store this engine reads from.
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Models ranked by like growth between their earliest and latest
    /// snapshot within the window.
    pub fn trending(&self, query: &TrendingQuery, today: NaiveDate) -> Result<Vec<TrendingModel>> {
        let from = format_date(window_start(today, query.days));
        let to = format_date(today);

        let conn = self.store.lock()?;
        let mut stmt = conn.prepare_cached(TRENDING_SQL)?;
        let rows = stmt.query_map(
            params![from, to, query.pipeline_tag, query.limit],
            |row| {
                Ok(TrendingModel {
                    model_id: row.get(0)?,
                    pipeline_tag: row.get(1)?,
                    likes_latest: row.get(2)?,
                    likes_delta: row.get(3)?,
                    snapshot_date_from: date_column(row, 4)?,
                    snapshot_date_to: date_column(row, 5)?,
                })
            },
        )?;

        let models = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(
            "trending: {} models (window {}..={}, tag={:?})",
            models.len(),
            from,
            to,
            query.pipeline_tag
        );
        Ok(models)
    }

    /// Models first seen within the window, newest first.
    pub fn new_models(&self, query: &NewModelsQuery, today: NaiveDate) -> Result<Vec<NewModel>> {
        let from = format_date(window_start(today, query.days));
        let until = format_date(day_after(today));

        let conn = self.store.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, author, pipeline_tag, first_seen_at
             FROM models
             WHERE first_seen_at >= ?1
               AND first_seen_at < ?2
               AND (?3 IS NULL OR pipeline_tag = ?3)
             ORDER BY first_seen_at DESC, id ASC
             LIMIT ?4",
        )?;
        let rows = stmt.query_map(params![from, until, query.pipeline_tag, query.limit], |row| {
            Ok(NewModel {
                id: row.get(0)?,
                name: row.get(1)?,
                author: row.get(2)?,
                pipeline_tag: row.get(3)?,
                first_seen_at: timestamp_column(row, 4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Most recent snapshots of one model. Unknown ids yield an empty list.
    pub fn history(&self, query: &HistoryQuery) -> Result<Vec<SnapshotPoint>> {
        let conn = self.store.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT snapshot_date, downloads_30d, likes, pipeline_tag, tags_json,
                    business_score, business_summary
             FROM model_snapshots
             WHERE model_id = ?1
             ORDER BY snapshot_date DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![query.model_id, query.limit], |row| {
            Ok(SnapshotPoint {
                snapshot_date: date_column(row, 0)?,
                downloads_30d: row.get(1)?,
                likes: row.get(2)?,
                pipeline_tag: row.get(3)?,
                tags: string_list_column(row, 4)?,
                business_score: row.get(5)?,
                business_summary: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Latest date present in the leaderboard table, if any.
    pub fn latest_arena_date(&self) -> Result<Option<NaiveDate>> {
        let conn = self.store.lock()?;
        let latest = conn
            .query_row(
                "SELECT snapshot_date FROM arena_rankings
                 ORDER BY snapshot_date DESC LIMIT 1",
                [],
                |row| date_column(row, 0),
            )
            .optional()?;
        Ok(latest)
    }

    /// Leaderboard rows for one date, best rank first.
    ///
    /// Without an explicit date the latest date present is used, since the
    /// upstream leaderboard is not refreshed daily.
    pub fn arena_rankings(&self, query: &RankingsQuery) -> Result<Vec<ArenaRankingRecord>> {
        let date = match query.snapshot_date {
            Some(date) => date,
            None => match self.latest_arena_date()? {
                Some(date) => date,
                None => return Ok(Vec::new()),
            },
        };

        let conn = self.store.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT snapshot_date, model_name, rank, elo_score
             FROM arena_rankings
             WHERE snapshot_date = ?1
             ORDER BY rank ASC, model_name ASC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![format_date(date), query.limit], row_to_arena_ranking)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Papers submitted within the window, newest first.
    pub fn recent_papers(
        &self,
        query: &RecentPapersQuery,
        today: NaiveDate,
    ) -> Result<Vec<PaperRecord>> {
        let from = format_date(window_start(today, query.days));
        let until = format_date(day_after(today));

        let conn = self.store.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT arxiv_id, title, abstract, submitted_at, authors_json, category, pwc_sota_flag
             FROM papers
             WHERE submitted_at >= ?1
               AND submitted_at < ?2
               AND (?3 IS NULL OR category = ?3)
             ORDER BY submitted_at DESC, arxiv_id ASC
             LIMIT ?4",
        )?;
        let rows = stmt.query_map(params![from, until, query.category, query.limit], row_to_paper)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
