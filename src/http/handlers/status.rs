//! Service status handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};

use crate::http::AppState;
use crate::stats::StatsSnapshot;

#[derive(Debug, Serialize)]
pub(crate) struct StatsResponse {
    #[serde(flatten)]
    snapshot: StatsSnapshot,
    uptime_secs: u64,
}

/// GET /api/stats - Counter snapshot plus uptime.
pub(crate) async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        snapshot: state.stats.snapshot(),
        uptime_secs: state.stats.uptime().as_secs(),
    })
}

/// GET /health
pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Any unmatched route.
pub(crate) async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "404 page not found\n")
}
