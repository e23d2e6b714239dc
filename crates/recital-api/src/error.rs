//! HTTP error response conversion
//!
//! Handlers return `Result<_, HttpAppError>`. Anything that converts into
//! `AppError`, plus `PipelineError` which also carries the failing stage,
//! becomes a JSON `ErrorResponse` with the status from `ErrorMetadata`.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use recital_core::{AppError, ErrorMetadata, LogLevel};
use recital_pipeline::{PipelineError, Stage};
use serde::{de::DeserializeOwned, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    /// Suggested action for the client (e.g., "Retry in a moment")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    /// Pipeline stage the request failed in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from recital-core)
#[derive(Debug)]
pub struct HttpAppError {
    pub error: AppError,
    pub stage: Option<Stage>,
}

impl From<AppError> for HttpAppError {
    fn from(error: AppError) -> Self {
        HttpAppError { error, stage: None }
    }
}

impl From<PipelineError> for HttpAppError {
    fn from(err: PipelineError) -> Self {
        HttpAppError {
            error: err.to_app_error(),
            stage: Some(err.stage()),
        }
    }
}

impl From<validator::ValidationErrors> for HttpAppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::from(err).into()
    }
}

/// Convert JSON body deserialization failures into a 400 with our ErrorResponse format.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(format!("Invalid request body: {}", rejection.body_text())).into()
    }
}

/// JSON body extractor that deserializes and validates the body, answering
/// with our ErrorResponse format (400 + JSON) when either step fails.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        inner.validate()?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError, stage: Option<Stage>) {
    let error_type = error.error_type();
    let stage = stage.map(|s| s.as_str()).unwrap_or("none");
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type, stage, "Request failed");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type, stage, "Request failed");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type, stage, "Request failed");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| matches!(env.to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.error;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error, self.stage);

        // Details never leave the service in production, nor for sensitive errors.
        let hide_details = is_production_env() || app_error.is_sensitive();
        let body = ErrorResponse {
            error: app_error.client_message(),
            details: (!hide_details).then(|| app_error.detailed_message()),
            error_type: (!hide_details).then(|| app_error.error_type().to_string()),
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
            stage: self.stage.map(|s| s.to_string()),
        };

        (status, Json(body)).into_response()
    }
}
