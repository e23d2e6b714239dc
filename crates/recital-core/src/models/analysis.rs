use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::media::MediaSummary;
use super::score::{ScoreBreakdown, ScoreReport};
use super::transcript::TranscriptionResult;

/// Body of the recitation analysis endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AnalysisRequest {
    /// Text the speaker was asked to recite.
    #[serde(alias = "original_text", alias = "referenceText")]
    #[validate(length(max = 20000))]
    pub reference_text: String,
    /// Publicly reachable URL of the recording.
    #[serde(alias = "audioUrl")]
    #[validate(url)]
    pub audio_url: String,
    /// Language hint for the recognizer, e.g. `en` or `zh`.
    #[serde(default)]
    pub language: Option<String>,
    /// Set to `false` to skip the language-model summary.
    #[serde(default)]
    pub include_summary: Option<bool>,
}

/// Wall-clock time spent in one pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StageTiming {
    pub stage: String,
    pub duration_ms: f64,
}

/// Response body of the recitation analysis endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalysisResult {
    pub success: bool,
    pub media: MediaSummary,
    pub score: ScoreBreakdown,
    pub details: ScoreReport,
    pub transcript: TranscriptionResult,
    pub feedback: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub stage_timings: Vec<StageTiming>,
    pub analyzed_at: DateTime<Utc>,
}

/// Body of the direct language-model completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CompletionRequest {
    #[validate(length(min = 1, max = 20000))]
    pub prompt: String,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompletionResponse {
    pub success: bool,
    pub data: String,
    pub message: String,
}
