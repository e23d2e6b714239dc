//! Upload endpoint: multipart handling and error mapping.

mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use helpers::{bearer, mp3_bytes, setup_test_app};
use serde_json::Value;

fn upload_form(data: Vec<u8>, filename: &str, mime: &str) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(data).file_name(filename).mime_type(mime),
    )
}

#[tokio::test]
async fn test_small_mp3_is_stored_as_is() {
    let app = setup_test_app();

    let response = app
        .client()
        .post("/api/v1/media/upload")
        .add_header("Authorization", bearer())
        .multipart(upload_form(mp3_bytes(1000), "take.mp3", "audio/mpeg"))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["file_type"], "audio");
    assert_eq!(body["message"], "File uploaded directly");
    let url = body["file_url"].as_str().unwrap();
    assert!(url.starts_with("https://media.example.com/audio/"));
    assert_eq!(app.storage.keys().len(), 1);
}

#[tokio::test]
async fn test_non_media_upload_is_415_with_stage() {
    let app = setup_test_app();

    let response = app
        .client()
        .post("/api/v1/media/upload")
        .add_header("Authorization", bearer())
        .multipart(upload_form(b"%PDF-1.7 not audio".to_vec(), "notes.pdf", "application/pdf"))
        .await;

    assert_eq!(response.status_code(), 415);
    let body: Value = response.json();
    assert_eq!(body["stage"], "validating");
    assert!(app.storage.keys().is_empty());
}

#[tokio::test]
async fn test_missing_file_field_is_400() {
    let app = setup_test_app();

    let form = MultipartForm::new().add_text("note", "no file here");
    let response = app
        .client()
        .post("/api/v1/media/upload")
        .add_header("Authorization", bearer())
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let app = setup_test_app();

    // Above MAX_FILE_SIZE plus the multipart headroom.
    let response = app
        .client()
        .post("/api/v1/media/upload")
        .add_header("Authorization", bearer())
        .multipart(upload_form(mp3_bytes(2 * 1024 * 1024), "long.mp3", "audio/mpeg"))
        .await;

    assert_eq!(response.status_code(), 413);
}

#[tokio::test]
async fn test_file_over_limit_within_headroom_is_413() {
    let app = setup_test_app();

    let response = app
        .client()
        .post("/api/v1/media/upload")
        .add_header("Authorization", bearer())
        .multipart(upload_form(mp3_bytes(70_000), "long.mp3", "audio/mpeg"))
        .await;

    assert_eq!(response.status_code(), 413);
    let body: Value = response.json();
    assert_eq!(body["stage"], "validating");
}
