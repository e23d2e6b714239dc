//! Encoding capability and its FFmpeg implementation.

use async_trait::async_trait;
use recital_core::MediaKind;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Audio track bitrate used by normalization passes.
const NORMALIZE_AUDIO_KBPS: u32 = 128;
const NORMALIZE_VIDEO_CRF: u32 = 23;
/// Lowest AAC bitrate a bitrate-targeted video keeps for its audio track.
const MIN_VIDEO_AUDIO_KBPS: u32 = 32;

/// What an encode should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeProfile {
    /// Canonical container at default quality, no size target.
    Normalize,
    /// Canonical container at a total stream bitrate.
    TargetBitrate { kbps: u32 },
    /// Mono 16 kHz PCM WAV for speech recognition.
    SpeechWav,
}

#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub kind: MediaKind,
    pub profile: EncodeProfile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOutput {
    pub path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed: {stderr}")]
    Failed { program: String, stderr: String },

    #[error("Failed to parse ffprobe output: {0}")]
    InvalidProbe(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encoding capability. One call produces one output file.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, job: &EncodeJob) -> Result<EncodeOutput, EncodeError>;
}

/// Stream facts needed to size an encode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaProbe {
    pub duration_seconds: Option<f64>,
    pub bitrate_bps: Option<u64>,
}

impl MediaProbe {
    pub fn bitrate_kbps(&self) -> Option<u32> {
        self.bitrate_bps
            .and_then(|bps| u32::try_from(bps / 1000).ok())
            .filter(|kbps| *kbps > 0)
    }
}

#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaProbe, EncodeError>;
}

/// FFmpeg-backed encoder
pub struct FfmpegEncoder {
    ffmpeg_path: String,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Split a total bitrate into (video, audio) kbps for an MP4 encode.
    fn split_video_bitrate(total_kbps: u32) -> (u32, u32) {
        let audio = (total_kbps / 4).clamp(MIN_VIDEO_AUDIO_KBPS, NORMALIZE_AUDIO_KBPS);
        (total_kbps.saturating_sub(audio).max(1), audio)
    }

    fn build_args(job: &EncodeJob) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-nostdin".into(),
            "-i".into(),
            job.input.to_string_lossy().to_string(),
        ];

        match (job.profile, job.kind) {
            (EncodeProfile::SpeechWav, _) => {
                args.extend(
                    ["-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1", "-f", "wav"]
                        .map(String::from),
                );
            }
            (EncodeProfile::Normalize, MediaKind::Audio) => {
                args.extend(["-vn", "-acodec", "libmp3lame"].map(String::from));
                args.extend(["-b:a".to_string(), format!("{}k", NORMALIZE_AUDIO_KBPS)]);
                args.extend(["-f", "mp3"].map(String::from));
            }
            (EncodeProfile::TargetBitrate { kbps }, MediaKind::Audio) => {
                args.extend(["-vn", "-acodec", "libmp3lame"].map(String::from));
                args.extend(["-b:a".to_string(), format!("{}k", kbps)]);
                args.extend(["-f", "mp3"].map(String::from));
            }
            (EncodeProfile::Normalize, MediaKind::Video) => {
                args.extend(["-c:v", "libx264", "-preset", "medium", "-crf"].map(String::from));
                args.push(NORMALIZE_VIDEO_CRF.to_string());
                args.extend(["-c:a".to_string(), "aac".to_string()]);
                args.extend(["-b:a".to_string(), format!("{}k", NORMALIZE_AUDIO_KBPS)]);
                args.extend(["-movflags", "+faststart", "-f", "mp4"].map(String::from));
            }
            (EncodeProfile::TargetBitrate { kbps }, MediaKind::Video) => {
                let (video_kbps, audio_kbps) = Self::split_video_bitrate(kbps);
                args.extend(["-c:v", "libx264", "-preset", "medium"].map(String::from));
                args.extend([
                    "-b:v".to_string(),
                    format!("{}k", video_kbps),
                    "-maxrate".to_string(),
                    format!("{}k", video_kbps),
                    "-bufsize".to_string(),
                    format!("{}k", video_kbps * 2),
                    "-c:a".to_string(),
                    "aac".to_string(),
                    "-b:a".to_string(),
                    format!("{}k", audio_kbps),
                ]);
                args.extend(["-movflags", "+faststart", "-f", "mp4"].map(String::from));
            }
        }

        args.push("-y".to_string());
        args.push(job.output.to_string_lossy().to_string());
        args
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    #[tracing::instrument(skip(self, job), fields(kind = %job.kind, profile = ?job.profile))]
    async fn encode(&self, job: &EncodeJob) -> Result<EncodeOutput, EncodeError> {
        let start = std::time::Instant::now();
        let args = Self::build_args(job);

        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| EncodeError::Spawn {
                program: self.ffmpeg_path.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(status = ?output.status.code(), "FFmpeg encode failed");
            return Err(EncodeError::Failed {
                program: "FFmpeg".to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        let size_bytes = tokio::fs::metadata(&job.output).await?.len();
        tracing::debug!(
            size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "FFmpeg encode finished"
        );

        Ok(EncodeOutput {
            path: job.output.clone(),
            size_bytes,
        })
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

/// ffprobe-backed prober
pub struct FfprobeProber {
    ffprobe_path: String,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    fn parse(stdout: &[u8]) -> Result<MediaProbe, EncodeError> {
        let parsed: FfprobeOutput =
            serde_json::from_slice(stdout).map_err(|e| EncodeError::InvalidProbe(e.to_string()))?;

        let duration_seconds = parsed
            .format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0);
        let bitrate_bps = parsed
            .format
            .as_ref()
            .and_then(|f| f.bit_rate.as_deref())
            .and_then(|b| b.parse::<u64>().ok());
        Ok(MediaProbe {
            duration_seconds,
            bitrate_bps,
        })
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    #[tracing::instrument(skip(self))]
    async fn probe(&self, path: &Path) -> Result<MediaProbe, EncodeError> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "error", "-show_format", "-of", "json"])
            .arg(path)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| EncodeError::Spawn {
                program: self.ffprobe_path.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EncodeError::Failed {
                program: "ffprobe".to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Self::parse(&output.stdout)
    }
}
