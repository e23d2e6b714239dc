use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::str::FromStr;
use utoipa::ToSchema;

/// Kind of recording accepted by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }

    /// Extension of the container every artifact of this kind is normalized to.
    pub fn canonical_extension(&self) -> &'static str {
        match self {
            MediaKind::Audio => "mp3",
            MediaKind::Video => "mp4",
        }
    }

    pub fn canonical_content_type(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio/mpeg",
            MediaKind::Video => "video/mp4",
        }
    }

    /// Whether `extension` already names the canonical container for this kind.
    pub fn is_canonical_extension(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case(self.canonical_extension())
    }
}

impl FromStr for MediaKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "audio" => Ok(MediaKind::Audio),
            "video" => Ok(MediaKind::Video),
            _ => Err(anyhow::anyhow!("Invalid media kind: {}", s)),
        }
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// MIME type for a file extension, falling back to `application/octet-stream`.
pub fn content_type_for_extension(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "ogg" => "audio/ogg",
        "wma" => "audio/x-ms-wma",
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "m4v" => "video/x-m4v",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

/// A validated recording held inside a request workspace.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    pub kind: MediaKind,
    pub original_size_bytes: u64,
    pub duration_seconds: Option<f64>,
    /// Overall bitrate reported by the prober.
    pub bitrate_kbps: Option<u32>,
    pub container_path: PathBuf,
}

impl MediaAsset {
    pub fn extension(&self) -> Option<&str> {
        self.container_path.extension().and_then(|e| e.to_str())
    }
}

/// State of the size-targeting search between encoder attempts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionPlan {
    pub target_size_bytes: u64,
    pub attempt: u32,
    pub candidate_bitrate_kbps: u32,
    pub result_size_bytes: Option<u64>,
}

/// Response body of the upload endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MediaProcessingResult {
    pub success: bool,
    pub file_url: String,
    pub file_type: MediaKind,
    pub original_size: u64,
    pub processed_size: u64,
    pub compression_ratio: f64,
    pub message: String,
}

/// Media facts reported alongside an analysis.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MediaSummary {
    pub kind: MediaKind,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}
