//! Health endpoint handler.

use crate::api::AppState;
use crate::budget::SpendSnapshot;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    /// Per-provider spend estimates against caps.
    pub providers: Vec<SpendSnapshot>,
}

/// GET /health - Return overall status and budget snapshots.
pub async fn handle(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let enabled = state.registry.enabled_providers().count();
    let status = if enabled > 0 { "ok" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        providers: state.ledger.snapshot(),
    })
}
