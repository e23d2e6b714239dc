//! Language-model completion capability (OpenAI-compatible chat API).

use async_trait::async_trait;
use recital_core::{LlmConfig, SecretString};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};

use crate::is_transient_status;

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("Language model is not configured")]
    NotConfigured,

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Language model request failed: {0}")]
    Network(String),

    #[error("Language model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid language model response: {0}")]
    InvalidResponse(String),
}

impl SummaryError {
    pub fn is_transient(&self) -> bool {
        match self {
            SummaryError::Network(_) => true,
            SummaryError::Status { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRequest {
    pub prompt: String,
    /// Falls back to the client's configured temperature.
    pub temperature: Option<f32>,
}

impl SummaryRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub model: Option<String>,
}

/// Text completion capability used for recitation summaries.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, request: &SummaryRequest) -> Result<Completion, SummaryError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

/// Client for `{base_url}/chat/completions` with bearer authentication.
pub struct ChatCompletionClient {
    http_client: Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl Debug for ChatCompletionClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ChatCompletionClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

impl ChatCompletionClient {
    pub fn new(config: &LlmConfig) -> Result<Self, SummaryError> {
        let api_key = config.api_key.clone().ok_or(SummaryError::NotConfigured)?;
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SummaryError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Summarizer for ChatCompletionClient {
    #[tracing::instrument(skip(self, request), fields(model = %self.model, prompt_chars = request.prompt.len()))]
    async fn summarize(&self, request: &SummaryRequest) -> Result<Completion, SummaryError> {
        let start = std::time::Instant::now();
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature.unwrap_or(self.temperature),
            max_tokens: self.max_tokens,
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| SummaryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!(status = status.as_u16(), "Language model call failed");
            return Err(SummaryError::Status {
                status: status.as_u16(),
                body: error_text.chars().take(512).collect(),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SummaryError::InvalidResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| SummaryError::InvalidResponse("empty completion".to_string()))?;

        tracing::info!(
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Language model call finished"
        );

        Ok(Completion {
            content,
            model: parsed.model,
        })
    }
}
