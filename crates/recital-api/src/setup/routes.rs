//! Route configuration and middleware setup

use crate::auth::{auth_middleware, AuthState};
use crate::constants::{API_PREFIX, OPENAPI_PATH, UPLOAD_BODY_HEADROOM};
use crate::handlers;
use crate::middleware::request_id_middleware;
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use recital_core::{Config, StorageBackend};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router> {
    let cors = setup_cors(config);
    let auth_state = Arc::new(AuthState::from_config(config.auth()));
    if auth_state.enabled {
        tracing::info!(keys = auth_state.api_keys.len(), "API key authentication enabled");
    } else {
        tracing::warn!("API key authentication disabled");
    }

    let protected_routes = protected_routes(config).layer(axum::middleware::from_fn_with_state(
        auth_state,
        auth_middleware,
    ));

    let mut app = public_routes()
        .merge(protected_routes)
        .merge(utoipa_rapidoc::RapiDoc::new(OPENAPI_PATH).path("/docs"));

    // Local storage hands out URLs under its base URL; serve them from here.
    let storage = config.storage();
    if storage.backend == StorageBackend::Local {
        app = app.nest_service("/media", ServeDir::new(&storage.local_path));
    }

    let http_concurrency_limit = config.server().http_concurrency_limit;
    tracing::info!(http_concurrency_limit, "HTTP concurrency limit layer enabled");

    let app = app
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    if config.cors_origins().iter().any(|o| o == "*") {
        if config.is_production() {
            tracing::warn!("CORS configured to allow all origins - not recommended for production");
        }
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins()
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    }
}

fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(OPENAPI_PATH, get(|| async { Json(crate::api_doc::openapi()) }))
}

fn protected_routes(config: &Config) -> Router<Arc<AppState>> {
    // Multipart framing rides on top of the file itself.
    let upload_limit = usize::try_from(config.max_file_size())
        .unwrap_or(usize::MAX)
        .saturating_add(UPLOAD_BODY_HEADROOM);

    Router::new()
        .route(
            &format!("{}/media/upload", API_PREFIX),
            post(handlers::media_upload::upload_media).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            &format!("{}/analysis", API_PREFIX),
            post(handlers::analysis::analyze_recitation),
        )
        .route(
            &format!("{}/analysis/supported-languages", API_PREFIX),
            get(handlers::analysis::supported_languages),
        )
        .route(
            &format!("{}/llm/complete", API_PREFIX),
            post(handlers::llm::complete),
        )
}
