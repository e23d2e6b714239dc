//! Speech recognition capability and its Cloudflare Workers AI client.

use async_trait::async_trait;
use bytes::Bytes;
use recital_core::{AsrConfig, SecretString, TranscriptSegment, TranscriptionResult};
use reqwest::Client;
use serde::Deserialize;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use crate::fetch::FetchError;
use crate::is_transient_status;

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("Speech recognition is not configured")]
    NotConfigured,

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Speech recognition request failed: {0}")]
    Network(String),

    #[error("Speech recognition returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Speech recognition rejected the audio: {0}")]
    Rejected(String),

    #[error("Invalid speech recognition response: {0}")]
    InvalidResponse(String),

    #[error("Failed to download recording: {0}")]
    Download(#[from] FetchError),
}

impl TranscriptionError {
    pub fn is_transient(&self) -> bool {
        match self {
            TranscriptionError::Network(_) => true,
            TranscriptionError::Status { status, .. } => is_transient_status(*status),
            TranscriptionError::Download(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Speech-to-text capability.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: Bytes,
        language: Option<&str>,
    ) -> Result<TranscriptionResult, TranscriptionError>;

    fn is_configured(&self) -> bool {
        true
    }
}

/// Stand-in used when no credentials are configured; every call fails permanently.
#[derive(Debug, Default)]
pub struct DisabledTranscriber;

#[async_trait]
impl Transcriber for DisabledTranscriber {
    async fn transcribe(
        &self,
        _audio: Bytes,
        _language: Option<&str>,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        Err(TranscriptionError::NotConfigured)
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[derive(Debug, Deserialize)]
struct WhisperEnvelope {
    result: Option<WhisperResult>,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WhisperResult {
    #[serde(default)]
    text: String,
    #[serde(default)]
    words: Vec<WhisperWord>,
    vtt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperWord {
    word: String,
    start: f64,
    end: f64,
}

fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

/// Whisper on Cloudflare Workers AI.
///
/// Posts the raw audio bytes to `{base_url}/{account_id}/ai/run/{model}` and
/// converts the per-word timings (seconds) into millisecond segments.
pub struct CloudflareWhisper {
    http_client: Client,
    endpoint: String,
    api_token: SecretString,
    default_language: String,
}

impl Debug for CloudflareWhisper {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CloudflareWhisper")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl CloudflareWhisper {
    pub fn new(config: &AsrConfig, timeout: Duration) -> Result<Self, TranscriptionError> {
        let (Some(account_id), Some(api_token)) = (&config.account_id, &config.api_token) else {
            return Err(TranscriptionError::NotConfigured);
        };

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TranscriptionError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: format!(
                "{}/{}/ai/run/{}",
                config.base_url.trim_end_matches('/'),
                account_id,
                config.model
            ),
            api_token: api_token.clone(),
            default_language: config.default_language.clone(),
        })
    }

    fn parse(body: &[u8]) -> Result<TranscriptionResult, TranscriptionError> {
        let envelope: WhisperEnvelope = serde_json::from_slice(body)
            .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))?;

        if !envelope.success {
            let reason = if envelope.errors.is_empty() {
                "unknown error".to_string()
            } else {
                envelope
                    .errors
                    .iter()
                    .map(|e| match e {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            return Err(TranscriptionError::Rejected(reason));
        }

        let result = envelope
            .result
            .ok_or_else(|| TranscriptionError::InvalidResponse("missing result".to_string()))?;

        let segments = result
            .words
            .into_iter()
            .map(|w| TranscriptSegment {
                text: w.word.trim().to_string(),
                start_ms: seconds_to_ms(w.start),
                end_ms: seconds_to_ms(w.end.max(w.start)),
                confidence: None,
            })
            .filter(|s| !s.text.is_empty())
            .collect();

        Ok(TranscriptionResult {
            text: result.text.trim().to_string(),
            language: None,
            segments,
            vtt: result.vtt,
        })
    }
}

#[async_trait]
impl Transcriber for CloudflareWhisper {
    #[tracing::instrument(skip(self, audio), fields(audio_bytes = audio.len()))]
    async fn transcribe(
        &self,
        audio: Bytes,
        language: Option<&str>,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        let start = std::time::Instant::now();
        let language = language
            .filter(|l| !l.is_empty())
            .unwrap_or(&self.default_language)
            .to_string();

        let response = self
            .http_client
            .post(&self.endpoint)
            .query(&[("language", language.as_str())])
            .bearer_auth(self.api_token.expose())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(audio)
            .send()
            .await
            .map_err(|e| TranscriptionError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TranscriptionError::Network(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Speech recognition call failed");
            return Err(TranscriptionError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).chars().take(512).collect(),
            });
        }

        let mut transcript = Self::parse(&body)?;
        transcript.language = Some(language);

        tracing::info!(
            words = transcript.segments.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Speech recognition finished"
        );
        Ok(transcript)
    }
}
