//! REST request handlers.
//!
//! Query strings are taken as raw strings and validated here, so malformed
//! numbers get the same JSON 400 body as out-of-range ones. Store reads run
//! on the blocking pool.

use crate::error::ApiError;
use crate::server::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use tracker_core::{
    ArenaRankingRecord, HistoryQuery, NewModel, NewModelsQuery, PaperRecord, QueryEngine,
    RankingsQuery, RecentPapersQuery, SnapshotPoint, TrackerError, TrendingModel, TrendingQuery,
};

/// Parameters shared by the windowed model queries.
#[derive(Debug, Default, Deserialize)]
pub struct ModelWindowParams {
    pub pipeline_tag: Option<String>,
    pub days: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RankingsParams {
    pub snapshot_date: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PapersParams {
    pub category: Option<String>,
    pub days: Option<String>,
    pub limit: Option<String>,
}

/// Parse an optional integer query parameter. Blank counts as absent.
fn int_param(field: &str, raw: Option<&str>) -> Result<Option<i64>, TrackerError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|_| TrackerError::validation(field, format!("expected an integer, got '{}'", s))),
    }
}

fn text_param(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty())
}

/// Run a query against the engine on the blocking pool.
async fn run_query<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&QueryEngine) -> tracker_core::Result<T> + Send + 'static,
{
    let engine = state.engine.clone();
    let result = tokio::task::spawn_blocking(move || f(&engine)).await?;
    Ok(result?)
}

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

pub async fn handle_trending(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ModelWindowParams>,
) -> Result<Json<Vec<TrendingModel>>, ApiError> {
    let query = TrendingQuery::new(
        text_param(params.pipeline_tag),
        int_param("days", params.days.as_deref())?,
        int_param("limit", params.limit.as_deref())?,
    )?;
    let today = state.today();
    debug!("trending: {:?} as of {}", query, today);
    let rows = run_query(&state, move |engine| engine.trending(&query, today)).await?;
    Ok(Json(rows))
}

pub async fn handle_new_models(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ModelWindowParams>,
) -> Result<Json<Vec<NewModel>>, ApiError> {
    let query = NewModelsQuery::new(
        text_param(params.pipeline_tag),
        int_param("days", params.days.as_deref())?,
        int_param("limit", params.limit.as_deref())?,
    )?;
    let today = state.today();
    let rows = run_query(&state, move |engine| engine.new_models(&query, today)).await?;
    Ok(Json(rows))
}

/// History of an `author/name` model id.
pub async fn handle_history(
    State(state): State<Arc<AppState>>,
    Path((author, name)): Path<(String, String)>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<SnapshotPoint>>, ApiError> {
    history(&state, format!("{}/{}", author, name), params).await
}

/// History of a model id without an author segment.
pub async fn handle_history_single(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<SnapshotPoint>>, ApiError> {
    history(&state, name, params).await
}

async fn history(
    state: &AppState,
    model_id: String,
    params: LimitParams,
) -> Result<Json<Vec<SnapshotPoint>>, ApiError> {
    let query = HistoryQuery::new(model_id, int_param("limit", params.limit.as_deref())?)?;
    let rows = run_query(state, move |engine| engine.history(&query)).await?;
    Ok(Json(rows))
}

pub async fn handle_arena_rankings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RankingsParams>,
) -> Result<Json<Vec<ArenaRankingRecord>>, ApiError> {
    let snapshot_date = text_param(params.snapshot_date);
    let query = RankingsQuery::new(
        snapshot_date.as_deref(),
        int_param("limit", params.limit.as_deref())?,
    )?;
    let rows = run_query(&state, move |engine| engine.arena_rankings(&query)).await?;
    Ok(Json(rows))
}

pub async fn handle_recent_papers(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PapersParams>,
) -> Result<Json<Vec<PaperRecord>>, ApiError> {
    let query = RecentPapersQuery::new(
        text_param(params.category),
        int_param("days", params.days.as_deref())?,
        int_param("limit", params.limit.as_deref())?,
    )?;
    let today = state.today();
    let rows = run_query(&state, move |engine| engine.recent_papers(&query, today)).await?;
    Ok(Json(rows))
}
