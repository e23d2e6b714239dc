use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, Json};
use recital_core::{AnalysisRequest, AnalysisResult};
use recital_pipeline::CancellationToken;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

/// Recognizer languages the scoring rules are tuned for.
const SUPPORTED_LANGUAGES: [(&str, &str, &str); 2] = [
    ("zh", "Chinese", "Mandarin recitation analysis"),
    ("en", "English", "English recitation analysis"),
];

#[derive(Debug, Serialize, ToSchema)]
pub struct SupportedLanguage {
    pub code: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SupportedLanguagesResponse {
    pub languages: Vec<SupportedLanguage>,
    /// Language sent to the recognizer when a request carries no hint.
    pub default: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/analysis",
    tag = "analysis",
    request_body = AnalysisRequest,
    responses(
        (status = 200, description = "Recitation scored", body = AnalysisResult),
        (status = 400, description = "Invalid input or unreachable recording", body = ErrorResponse),
        (status = 413, description = "Recording too large", body = ErrorResponse),
        (status = 422, description = "Reference text has no words", body = ErrorResponse),
        (status = 502, description = "Speech recognition failed", body = ErrorResponse),
        (status = 503, description = "Speech recognition not configured", body = ErrorResponse),
        (status = 504, description = "Analysis timed out", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(operation = "analyze_recitation"))]
pub async fn analyze_recitation(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<AnalysisRequest>,
) -> Result<Json<AnalysisResult>, HttpAppError> {
    let token = CancellationToken::new();
    let _guard = token.clone().drop_guard();

    let result = state.orchestrator.analyze_recitation(request, token).await?;
    tracing::info!(
        overall = result.score.overall,
        summary = result.summary.is_some(),
        "Recitation analyzed"
    );
    Ok(Json(result))
}

#[utoipa::path(
    get,
    path = "/api/v1/analysis/supported-languages",
    tag = "analysis",
    responses(
        (status = 200, description = "Languages accepted as recognizer hints", body = SupportedLanguagesResponse)
    )
)]
pub async fn supported_languages(
    State(state): State<Arc<AppState>>,
) -> Json<SupportedLanguagesResponse> {
    let languages = SUPPORTED_LANGUAGES
        .iter()
        .map(|(code, name, description)| SupportedLanguage {
            code: code.to_string(),
            name: name.to_string(),
            description: description.to_string(),
        })
        .collect();
    Json(SupportedLanguagesResponse {
        languages,
        default: state.config.asr().default_language.clone(),
    })
}
