use crate::error::HttpAppError;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use recital_core::{AppError, AuthConfig, SecretString};
use std::sync::Arc;
use subtle::ConstantTimeEq;

const API_KEY_HEADER: &str = "X-API-Key";

/// Static API keys guarding the pipeline routes.
#[derive(Clone, Debug)]
pub struct AuthState {
    pub enabled: bool,
    pub api_keys: Vec<SecretString>,
}

impl AuthState {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            enabled: config.enabled,
            api_keys: config.api_keys.clone(),
        }
    }

    fn accepts(&self, candidate: &str) -> bool {
        self.api_keys
            .iter()
            .any(|key| secure_compare(candidate, key.expose()))
    }
}

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// `X-API-Key` wins over `Authorization: Bearer`.
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|h| h.to_str().ok()) {
        return Some(key.trim());
    }
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
}

pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    if !auth_state.enabled {
        return next.run(request).await;
    }

    let verdict = presented_key(request.headers()).map(|key| auth_state.accepts(key));
    match verdict {
        Some(true) => next.run(request).await,
        Some(false) => {
            tracing::warn!(path = %request.uri().path(), "Rejected request with invalid API key");
            HttpAppError::from(AppError::Unauthorized("Invalid API key".to_string()))
                .into_response()
        }
        None => HttpAppError::from(AppError::Unauthorized("Missing API key".to_string()))
            .into_response(),
    }
}
