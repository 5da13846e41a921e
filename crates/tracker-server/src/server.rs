//! HTTP server implementation using Axum.

use crate::handlers::{
    handle_arena_rankings, handle_health, handle_history, handle_history_single,
    handle_new_models, handle_recent_papers, handle_trending,
};
use axum::{routing::get, Router};
use chrono::{NaiveDate, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracker_core::QueryEngine;

/// Application state shared across handlers.
pub struct AppState {
    /// Read-only query engine over the snapshot store
    pub engine: QueryEngine,
    /// Pinned calendar date; `None` means the current UTC date
    pub fixed_today: Option<NaiveDate>,
}

impl AppState {
    pub fn new(engine: QueryEngine) -> Self {
        Self {
            engine,
            fixed_today: None,
        }
    }

    /// Pin "today" for every query, e.g. to replay a past day.
    pub fn with_fixed_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    /// The calendar date queries are evaluated against.
    pub fn today(&self) -> NaiveDate {
        self.fixed_today
            .unwrap_or_else(|| Utc::now().date_naive())
    }
}

/// Build the REST router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/models/trending", get(handle_trending))
        .route("/models/new", get(handle_new_models))
        .route("/models/:author/:name/history", get(handle_history))
        .route("/models/:name/history", get(handle_history_single))
        .route("/arena/rankings", get(handle_arena_rankings))
        .route("/papers/recent", get(handle_recent_papers))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the REST server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(state: AppState, host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let app = create_router(Arc::new(state));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use tower::ServiceExt;
    use tracker_core::{PaperFields, SnapshotMetrics, SnapshotStore};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn likes(n: i64, tag: &str) -> SnapshotMetrics {
        SnapshotMetrics {
            likes: n,
            pipeline_tag: Some(tag.to_string()),
            ..Default::default()
        }
    }

    /// Store with the worked example: two text-generation models with a
    /// week of snapshots, one image model, a leaderboard and a paper.
    fn seeded_state() -> Arc<AppState> {
        let store = SnapshotStore::open_in_memory().unwrap();
        let seen = Utc.with_ymd_and_hms(2026, 2, 22, 9, 30, 0).unwrap();

        store
            .upsert_model_at("acme/a", "a", Some("acme"), Some("text-generation"), seen)
            .unwrap();
        store
            .upsert_model_at("acme/b", "b", Some("acme"), Some("text-generation"), seen)
            .unwrap();
        store
            .upsert_model_at("pix", "pix", None, Some("text-to-image"), seen)
            .unwrap();

        for (id, day, n, tag) in [
            ("acme/a", "2026-02-19", 100, "text-generation"),
            ("acme/a", "2026-02-26", 160, "text-generation"),
            ("acme/b", "2026-02-19", 500, "text-generation"),
            ("acme/b", "2026-02-26", 520, "text-generation"),
            ("pix", "2026-02-20", 10, "text-to-image"),
            ("pix", "2026-02-26", 90, "text-to-image"),
        ] {
            store.upsert_snapshot(id, date(day), &likes(n, tag)).unwrap();
        }

        store.upsert_arena_ranking(date("2026-02-10"), "old-model", 1, 1200).unwrap();
        store.upsert_arena_ranking(date("2026-02-24"), "gpt-x", 1, 1300).unwrap();
        store.upsert_arena_ranking(date("2026-02-24"), "claude-y", 2, 1290).unwrap();

        store
            .upsert_paper(
                "2602.00001",
                &PaperFields {
                    title: Some("Recent".into()),
                    submitted_at: Some(Utc.with_ymd_and_hms(2026, 2, 25, 12, 0, 0).unwrap()),
                    category: Some("cs.CL".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        Arc::new(AppState::new(QueryEngine::new(store)).with_fixed_today(date("2026-02-26")))
    }

    async fn fetch(state: Arc<AppState>, uri: &str) -> (StatusCode, Value) {
        let response = create_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = fetch(seeded_state(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_trending_ranks_by_delta() {
        let (status, body) = fetch(
            seeded_state(),
            "/models/trending?pipeline_tag=text-generation&days=7&limit=10",
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["model_id"], "acme/a");
        assert_eq!(rows[0]["likes_delta"], 60);
        assert_eq!(rows[0]["likes_latest"], 160);
        assert_eq!(rows[0]["snapshot_date_from"], "2026-02-19");
        assert_eq!(rows[0]["snapshot_date_to"], "2026-02-26");
        assert_eq!(rows[1]["model_id"], "acme/b");
        assert_eq!(rows[1]["likes_delta"], 20);
    }

    #[tokio::test]
    async fn test_out_of_range_params_are_rejected() {
        for uri in [
            "/models/trending?days=0",
            "/models/trending?days=91",
            "/models/trending?limit=101",
            "/models/trending?days=abc",
            "/models/new?pipeline_tag=not-a-task",
            "/papers/recent?category=math.CO",
            "/arena/rankings?snapshot_date=26-02-2026",
            "/arena/rankings?limit=501",
            "/models/acme/a/history?limit=0",
        ] {
            let (status, body) = fetch(seeded_state(), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["error"], "BAD_REQUEST", "{}", uri);
            assert!(body["message"].as_str().is_some(), "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_boundary_params_are_accepted() {
        for uri in [
            "/models/trending?days=1&limit=1",
            "/models/trending?days=90&limit=100",
            "/models/new?days=90",
            "/arena/rankings?limit=500",
            "/models/acme/a/history?limit=180",
        ] {
            let (status, _) = fetch(seeded_state(), uri).await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_new_models_window() {
        let (_, body) = fetch(seeded_state(), "/models/new?days=7").await;
        assert_eq!(body.as_array().unwrap().len(), 3);

        let (_, body) = fetch(seeded_state(), "/models/new?days=7&pipeline_tag=text-to-image").await;
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "pix");

        let (_, body) = fetch(seeded_state(), "/models/new?days=1").await;
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_routes() {
        let (status, body) = fetch(seeded_state(), "/models/acme/a/history").await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["snapshot_date"], "2026-02-26");
        assert_eq!(rows[1]["snapshot_date"], "2026-02-19");

        let (status, body) = fetch(seeded_state(), "/models/pix/history?limit=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = fetch(seeded_state(), "/models/nobody/nothing/history").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_arena_rankings_latest_and_explicit() {
        let (_, body) = fetch(seeded_state(), "/arena/rankings").await;
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["model_name"], "gpt-x");
        assert_eq!(rows[0]["snapshot_date"], "2026-02-24");

        let (_, body) = fetch(seeded_state(), "/arena/rankings?snapshot_date=2026-02-10").await;
        assert_eq!(body[0]["model_name"], "old-model");

        let (status, body) = fetch(seeded_state(), "/arena/rankings?snapshot_date=2025-01-01").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_papers() {
        let (_, body) = fetch(seeded_state(), "/papers/recent?category=cs.CL").await;
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["arxiv_id"], "2602.00001");

        let (_, body) = fetch(seeded_state(), "/papers/recent?category=cs.CV").await;
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_server_starts() {
        let store = SnapshotStore::open_in_memory().unwrap();
        let addr = start_server(AppState::new(QueryEngine::new(store)), "127.0.0.1", 0)
            .await
            .unwrap();
        assert!(addr.port() > 0);
    }
}
