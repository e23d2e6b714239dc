//! OpenAPI documentation.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use recital_core::models;

/// The served document, including the API key security schemes.
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
        );
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Recital API",
        version = "0.1.0",
        description = "Recitation analysis service: uploads recordings to object storage at a bounded size, transcribes them and scores them against a reference text. Pipeline routes live under /api/v1/."
    ),
    paths(
        handlers::media_upload::upload_media,
        handlers::analysis::analyze_recitation,
        handlers::analysis::supported_languages,
        handlers::llm::complete,
        handlers::health::health_check,
    ),
    components(
        schemas(
            models::MediaProcessingResult,
            models::MediaSummary,
            models::AnalysisRequest,
            models::AnalysisResult,
            models::StageTiming,
            models::ScoreBreakdown,
            models::ScoreReport,
            models::ScoringWeights,
            models::WordDetail,
            models::AlignmentOp,
            models::AlignmentCounts,
            models::TranscriptionResult,
            models::TranscriptSegment,
            models::CompletionRequest,
            models::CompletionResponse,
            handlers::analysis::SupportedLanguage,
            handlers::analysis::SupportedLanguagesResponse,
            handlers::health::HealthResponse,
            error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "media", description = "Recording upload with size-targeted transcoding"),
        (name = "analysis", description = "Recitation transcription and scoring"),
        (name = "llm", description = "Direct language model completion"),
        (name = "health", description = "Service health and configuration"),
    )
)]
struct ApiDoc;
