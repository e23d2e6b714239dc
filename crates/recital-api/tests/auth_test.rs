//! API key authentication on the pipeline routes.

mod helpers;

use helpers::{bearer, setup_test_app, setup_test_app_with, AppOptions};
use serde_json::{json, Value};

fn completion_body() -> Value {
    json!({ "prompt": "Say hello" })
}

#[tokio::test]
async fn test_missing_key_is_rejected() {
    let app = setup_test_app();

    let response = app
        .client()
        .post("/api/v1/llm/complete")
        .json(&completion_body())
        .await;

    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(body["error"], "Missing API key");
}

#[tokio::test]
async fn test_wrong_key_is_rejected() {
    let app = setup_test_app();

    let response = app
        .client()
        .post("/api/v1/llm/complete")
        .add_header("Authorization", "Bearer not-the-key")
        .json(&completion_body())
        .await;

    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_bearer_and_header_keys_are_accepted() {
    let app = setup_test_app();

    let via_bearer = app
        .client()
        .post("/api/v1/llm/complete")
        .add_header("Authorization", bearer())
        .json(&completion_body())
        .await;
    assert_eq!(via_bearer.status_code(), 200);

    let via_header = app
        .client()
        .post("/api/v1/llm/complete")
        .add_header("X-API-Key", "second-key")
        .json(&completion_body())
        .await;
    assert_eq!(via_header.status_code(), 200);
}

#[tokio::test]
async fn test_disabled_auth_lets_requests_through() {
    let app = setup_test_app_with(AppOptions {
        auth: false,
        ..Default::default()
    });

    let response = app
        .client()
        .post("/api/v1/llm/complete")
        .json(&completion_body())
        .await;

    assert_eq!(response.status_code(), 200);
}
