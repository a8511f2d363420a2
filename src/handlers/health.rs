//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    prediction_mode: &'static str,
    record_store: &'static str,
    timestamp: i64,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        prediction_mode: state.orchestrator.backend().name(),
        record_store: state.orchestrator.store().kind(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}
