use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, Json};
use recital_core::{CompletionRequest, CompletionResponse};
use recital_pipeline::CancellationToken;
use recital_services::SummaryRequest;
use std::sync::Arc;

#[utoipa::path(
    post,
    path = "/api/v1/llm/complete",
    tag = "llm",
    request_body = CompletionRequest,
    responses(
        (status = 200, description = "Completion text", body = CompletionResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 502, description = "Language model failed", body = ErrorResponse),
        (status = 503, description = "No language model configured", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(operation = "llm_complete"))]
pub async fn complete(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CompletionRequest>,
) -> Result<Json<CompletionResponse>, HttpAppError> {
    let token = CancellationToken::new();
    let _guard = token.clone().drop_guard();

    let completion = state
        .orchestrator
        .complete(
            SummaryRequest {
                prompt: request.prompt,
                temperature: request.temperature,
            },
            token,
        )
        .await?;

    Ok(Json(CompletionResponse {
        success: true,
        data: completion.content,
        message: match completion.model {
            Some(model) => format!("Completed by {}", model),
            None => "Completed".to_string(),
        },
    }))
}
