//! Application setup and initialization
//!
//! Startup is split out of main.rs so tests can build the same router around
//! stub capabilities.

pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use recital_core::Config;
use recital_pipeline::{Capabilities, Orchestrator, PipelineSettings};
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    crate::telemetry::init_telemetry(json_logs)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.server().environment,
        "Configuration loaded and validated successfully"
    );

    let caps = services::build_capabilities(&config).await?;
    build_app(config, caps)
}

/// Router and state around an already-built set of capabilities.
pub fn build_app(config: Config, caps: Capabilities) -> Result<(Arc<AppState>, axum::Router)> {
    let orchestrator = Orchestrator::new(caps, PipelineSettings::from_config(&config));
    let state = Arc::new(AppState::new(config, orchestrator));
    let router = routes::setup_routes(&state.config, state.clone())?;
    Ok((state, router))
}
