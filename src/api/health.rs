use axum::{extract::State, Json};
use serde::Serialize;

use crate::controller::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    batteries: usize,
    pending_updates: usize,
}

/// GET /api/v1/healthz
pub async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now(),
        batteries: state.controller.batteries().count(),
        pending_updates: state.controller.pending().len(),
    })
}
