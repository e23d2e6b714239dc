//! Health check handler and response type.

use crate::constants::SERVICE_VERSION;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub temp_dir: String,
    pub max_file_size: u64,
    pub target_file_size: u64,
    pub storage_backend: String,
    pub asr_configured: bool,
    pub summarizer_configured: bool,
}

/// Liveness plus the effective limits and capability wiring.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let config = &state.config;
    let orchestrator = &state.orchestrator;
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: config.server().service_name.clone(),
        version: SERVICE_VERSION.to_string(),
        temp_dir: config.temp_dir().display().to_string(),
        max_file_size: config.max_file_size(),
        target_file_size: config.target_file_size(),
        storage_backend: orchestrator.storage_backend().to_string(),
        asr_configured: orchestrator.asr_configured(),
        summarizer_configured: orchestrator.summarizer_configured(),
    })
}
