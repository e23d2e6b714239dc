//! Analysis and completion endpoints.

mod helpers;

use helpers::{bearer, setup_test_app, setup_test_app_with, AppOptions, REFERENCE};
use serde_json::{json, Value};

#[tokio::test]
async fn test_analysis_scores_recitation() {
    let app = setup_test_app();

    let response = app
        .client()
        .post("/api/v1/analysis")
        .add_header("Authorization", bearer())
        .json(&json!({
            "original_text": REFERENCE,
            "audio_url": "https://cdn.example.com/take.mp3",
        }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    let accuracy = body["score"]["accuracy"].as_f64().unwrap();
    assert!(accuracy > 0.8 && accuracy < 1.0, "accuracy {accuracy}");
    let missing: Vec<&str> = body["details"]["missing_words"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(missing, vec!["lazy"]);
    assert!(body["summary"].as_str().unwrap().starts_with("echo:"));
    assert_eq!(app.fetcher.calls(), 1);
}

#[tokio::test]
async fn test_analysis_can_skip_summary() {
    let app = setup_test_app();

    let body: Value = app
        .client()
        .post("/api/v1/analysis")
        .add_header("Authorization", bearer())
        .json(&json!({
            "reference_text": REFERENCE,
            "audio_url": "https://cdn.example.com/take.mp3",
            "include_summary": false,
        }))
        .await
        .json();

    assert!(body.get("summary").is_none());
}

#[tokio::test]
async fn test_empty_reference_is_422() {
    let app = setup_test_app();

    let response = app
        .client()
        .post("/api/v1/analysis")
        .add_header("Authorization", bearer())
        .json(&json!({
            "reference_text": "  ,, ",
            "audio_url": "https://cdn.example.com/take.mp3",
        }))
        .await;

    assert_eq!(response.status_code(), 422);
    let body: Value = response.json();
    assert_eq!(body["stage"], "validating");
    assert_eq!(app.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_invalid_url_is_400() {
    let app = setup_test_app();

    let response = app
        .client()
        .post("/api/v1/analysis")
        .add_header("Authorization", bearer())
        .json(&json!({
            "reference_text": REFERENCE,
            "audio_url": "not a url",
        }))
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let app = setup_test_app();

    let response = app
        .client()
        .post("/api/v1/analysis")
        .add_header("Authorization", bearer())
        .add_header("Content-Type", "application/json")
        .text("{\"reference_text\": ")
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_analysis_without_asr_is_503() {
    let app = setup_test_app_with(AppOptions {
        asr: false,
        ..Default::default()
    });

    let response = app
        .client()
        .post("/api/v1/analysis")
        .add_header("Authorization", bearer())
        .json(&json!({
            "reference_text": REFERENCE,
            "audio_url": "https://cdn.example.com/take.mp3",
        }))
        .await;

    assert_eq!(response.status_code(), 503);
    let body: Value = response.json();
    assert_eq!(body["stage"], "transcribing");
}

#[tokio::test]
async fn test_completion_returns_text() {
    let app = setup_test_app();

    let response = app
        .client()
        .post("/api/v1/llm/complete")
        .add_header("Authorization", bearer())
        .json(&json!({ "prompt": "Say hello", "temperature": 0.2 }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], "echo: Say hello");
}

#[tokio::test]
async fn test_completion_without_llm_is_503() {
    let app = setup_test_app_with(AppOptions {
        llm: false,
        ..Default::default()
    });

    let response = app
        .client()
        .post("/api/v1/llm/complete")
        .add_header("Authorization", bearer())
        .json(&json!({ "prompt": "Say hello" }))
        .await;

    assert_eq!(response.status_code(), 503);
}

#[tokio::test]
async fn test_empty_prompt_is_400() {
    let app = setup_test_app();

    let response = app
        .client()
        .post("/api/v1/llm/complete")
        .add_header("Authorization", bearer())
        .json(&json!({ "prompt": "" }))
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_supported_languages_default_to_chinese() {
    let app = setup_test_app();

    let response = app
        .client()
        .get("/api/v1/analysis/supported-languages")
        .add_header("Authorization", bearer())
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    let codes: Vec<&str> = body["languages"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|l| l["code"].as_str())
        .collect();
    assert_eq!(codes, vec!["zh", "en"]);
    assert_eq!(body["default"], "zh");
}

#[tokio::test]
async fn test_supported_languages_report_configured_default() {
    let app = setup_test_app_with(AppOptions {
        env: vec![("ASR_DEFAULT_LANGUAGE", "en".to_string())],
        ..AppOptions::default()
    });

    let body: Value = app
        .client()
        .get("/api/v1/analysis/supported-languages")
        .add_header("Authorization", bearer())
        .await
        .json();

    assert_eq!(body["default"], "en");
}

#[tokio::test]
async fn test_supported_languages_require_a_key() {
    let app = setup_test_app();

    let response = app
        .client()
        .get("/api/v1/analysis/supported-languages")
        .await;

    assert_eq!(response.status_code(), 401);
}
