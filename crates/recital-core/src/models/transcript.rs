use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One timed word or phrase from the speech recognizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TranscriptSegment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
    /// Recognizer confidence in [0,1], when the engine reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Transcript of a recording as returned by the ASR capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TranscriptionResult {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub segments: Vec<TranscriptSegment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vtt: Option<String>,
}

impl TranscriptionResult {
    pub fn has_segments(&self) -> bool {
        !self.segments.is_empty()
    }
}
