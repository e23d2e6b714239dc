//! Adaptive size-targeting transcoder.
//!
//! Inputs already under the target are passed through or normalized once.
//! Larger inputs are encoded at a bitrate derived from the target size and the
//! duration, shrinking the bitrate after each oversize attempt until the
//! output fits or the attempt bound is reached.

use recital_core::{CompressionPlan, MediaAsset, MediaKind, TranscodeConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::encoder::{EncodeError, EncodeJob, EncodeProfile, Encoder};

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("Output still exceeds target after {attempts} attempts ({last_size} > {target} bytes)")]
    ExceededAfterMaxAttempts {
        attempts: u32,
        last_size: u64,
        target: u64,
    },

    #[error("Media duration is unknown; cannot size the output")]
    UnknownDuration,

    #[error("Encoder failed: {0}")]
    Encode(#[from] EncodeError),
}

/// Result of a successful transcode stage.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeOutcome {
    pub artifact_path: PathBuf,
    pub kind: MediaKind,
    pub original_size_bytes: u64,
    pub final_size_bytes: u64,
    /// `final_size_bytes / original_size_bytes`.
    pub compression_ratio: f64,
    /// Number of encoder invocations.
    pub attempts: u32,
    /// The container changed to the canonical format.
    pub converted: bool,
    /// A bitrate-targeted encode was needed to meet the size target.
    pub compressed: bool,
    /// Final state of the bitrate search, when one ran.
    pub plan: Option<CompressionPlan>,
}

impl TranscodeOutcome {
    /// Pass-through only happens for canonical containers, so the artifact
    /// always carries the canonical extension.
    pub fn extension(&self) -> &'static str {
        self.kind.canonical_extension()
    }

    /// Human-readable summary returned to the uploader.
    pub fn message(&self) -> &'static str {
        match (self.compressed, self.converted) {
            (true, true) => "File compressed and converted successfully",
            (true, false) => "File compressed successfully",
            (false, true) => "File converted successfully",
            (false, false) => "File uploaded directly",
        }
    }
}

fn ratio(final_size: u64, original_size: u64) -> f64 {
    if original_size == 0 {
        1.0
    } else {
        final_size as f64 / original_size as f64
    }
}

/// Bitrate in kbps that makes `duration_seconds` of media occupy `target_bytes`.
pub fn initial_bitrate_kbps(target_bytes: u64, duration_seconds: f64) -> u32 {
    (target_bytes as f64 * 8.0 / duration_seconds / 1000.0).floor() as u32
}

pub struct AdaptiveTranscoder {
    encoder: Arc<dyn Encoder>,
    config: TranscodeConfig,
}

impl AdaptiveTranscoder {
    pub fn new(encoder: Arc<dyn Encoder>, config: TranscodeConfig) -> Self {
        Self { encoder, config }
    }

    pub fn config(&self) -> &TranscodeConfig {
        &self.config
    }

    /// Produce a canonical artifact no larger than the configured target.
    /// Intermediate outputs are written to `out_dir` and removed when rejected.
    #[tracing::instrument(skip(self, asset, out_dir), fields(kind = %asset.kind, original_size = asset.original_size_bytes))]
    pub async fn transcode(
        &self,
        asset: &MediaAsset,
        out_dir: &Path,
    ) -> Result<TranscodeOutcome, TranscodeError> {
        let original = asset.original_size_bytes;
        let target = self.config.target_file_size;
        let canonical = asset
            .extension()
            .map(|ext| asset.kind.is_canonical_extension(ext))
            .unwrap_or(false);
        let ext = asset.kind.canonical_extension();

        if original <= target {
            if canonical {
                tracing::info!("Input already within target and canonical; passing through");
                return Ok(TranscodeOutcome {
                    artifact_path: asset.container_path.clone(),
                    kind: asset.kind,
                    original_size_bytes: original,
                    final_size_bytes: original,
                    compression_ratio: 1.0,
                    attempts: 0,
                    converted: false,
                    compressed: false,
                    plan: None,
                });
            }

            let job = EncodeJob {
                input: asset.container_path.clone(),
                output: out_dir.join(format!("normalized.{}", ext)),
                kind: asset.kind,
                profile: EncodeProfile::Normalize,
            };
            let out = self.encoder.encode(&job).await?;
            if out.size_bytes <= self.config.accepted_size() {
                tracing::info!(size_bytes = out.size_bytes, "Input normalized");
                return Ok(TranscodeOutcome {
                    artifact_path: out.path,
                    kind: asset.kind,
                    original_size_bytes: original,
                    final_size_bytes: out.size_bytes,
                    compression_ratio: ratio(out.size_bytes, original),
                    attempts: 1,
                    converted: true,
                    compressed: false,
                    plan: None,
                });
            }

            tracing::warn!(
                size_bytes = out.size_bytes,
                target,
                "Normalized output exceeds target; falling back to bitrate search"
            );
            remove_quietly(&out.path).await;
        }

        self.search(asset, out_dir, !canonical).await
    }

    async fn search(
        &self,
        asset: &MediaAsset,
        out_dir: &Path,
        converted: bool,
    ) -> Result<TranscodeOutcome, TranscodeError> {
        let original = asset.original_size_bytes;
        let target = self.config.target_file_size;
        let accepted = self.config.accepted_size();
        let duration = asset
            .duration_seconds
            .filter(|d| d.is_finite() && *d > 0.0)
            .ok_or(TranscodeError::UnknownDuration)?;

        let (kind_floor, kind_ceiling) = self.config.bitrate_bounds(asset.kind);
        // Never ask for more than the source already spends.
        let original_kbps = asset
            .bitrate_kbps
            .unwrap_or_else(|| initial_bitrate_kbps(original, duration))
            .max(1);
        let ceiling = kind_ceiling.min(original_kbps);
        let floor = kind_floor.min(ceiling);

        let mut plan = CompressionPlan {
            target_size_bytes: target,
            attempt: 0,
            candidate_bitrate_kbps: initial_bitrate_kbps(target, duration).clamp(floor, ceiling),
            result_size_bytes: None,
        };
        let ext = asset.kind.canonical_extension();

        while plan.attempt < self.config.max_attempts {
            plan.attempt += 1;
            let job = EncodeJob {
                input: asset.container_path.clone(),
                output: out_dir.join(format!("attempt-{}.{}", plan.attempt, ext)),
                kind: asset.kind,
                profile: EncodeProfile::TargetBitrate {
                    kbps: plan.candidate_bitrate_kbps,
                },
            };
            let out = self.encoder.encode(&job).await?;
            plan.result_size_bytes = Some(out.size_bytes);

            tracing::info!(
                attempt = plan.attempt,
                bitrate_kbps = plan.candidate_bitrate_kbps,
                size_bytes = out.size_bytes,
                target,
                "Transcode attempt finished"
            );

            if out.size_bytes <= accepted {
                return Ok(TranscodeOutcome {
                    artifact_path: out.path,
                    kind: asset.kind,
                    original_size_bytes: original,
                    final_size_bytes: out.size_bytes,
                    compression_ratio: ratio(out.size_bytes, original),
                    attempts: plan.attempt,
                    converted,
                    compressed: true,
                    plan: Some(plan),
                });
            }

            remove_quietly(&out.path).await;

            let next = ((plan.candidate_bitrate_kbps as f64) * self.config.shrink_factor).floor()
                as u32;
            let next = next.clamp(floor, ceiling);
            if next >= plan.candidate_bitrate_kbps {
                tracing::warn!(
                    bitrate_kbps = plan.candidate_bitrate_kbps,
                    "Bitrate pinned at floor; stopping search"
                );
                break;
            }
            plan.candidate_bitrate_kbps = next;
        }

        Err(TranscodeError::ExceededAfterMaxAttempts {
            attempts: plan.attempt,
            last_size: plan.result_size_bytes.unwrap_or(original),
            target,
        })
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!(error = %e, path = %path.display(), "Failed to remove rejected output");
    }
}
