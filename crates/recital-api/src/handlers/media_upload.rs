use crate::constants::UPLOAD_FIELD;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use recital_core::{AppError, MediaProcessingResult};
use recital_pipeline::{CancellationToken, UploadInput};
use std::sync::Arc;

fn multipart_error(err: MultipartError) -> HttpAppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text()).into()
    } else {
        AppError::InvalidInput(format!("Invalid multipart body: {}", err.body_text())).into()
    }
}

/// First `file` field of the form; other fields are ignored.
async fn read_upload(multipart: &mut Multipart) -> Result<UploadInput, HttpAppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;
        return Ok(UploadInput {
            filename,
            content_type,
            data,
        });
    }
    Err(AppError::InvalidInput(format!("Missing multipart field '{}'", UPLOAD_FIELD)).into())
}

#[utoipa::path(
    post,
    path = "/api/v1/media/upload",
    tag = "media",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Recording stored", body = MediaProcessingResult),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 415, description = "Not an audio or video file", body = ErrorResponse),
        (status = 500, description = "Transcoding failed", body = ErrorResponse),
        (status = 502, description = "Object storage failed", body = ErrorResponse),
        (status = 504, description = "A stage timed out", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_media"))]
pub async fn upload_media(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<MediaProcessingResult>, HttpAppError> {
    let input = read_upload(&mut multipart).await?;

    // A client that disconnects drops this future, and with it the guard.
    let token = CancellationToken::new();
    let _guard = token.clone().drop_guard();

    let result = state.orchestrator.process_media(input, token).await?;
    Ok(Json(result))
}
