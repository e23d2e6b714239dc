use recital_core::AppError;
use recital_processing::{EncodeError, TranscodeError, ValidationError};
use recital_scoring::ScoringError;
use recital_services::{FetchError, SummaryError, TranscriptionError};
use recital_storage::StorageError;
use std::io;
use std::time::Duration;

use crate::stage::{PipelineState, Stage};

/// Failures a capability call may recover from on a second try.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for StorageError {
    fn is_transient(&self) -> bool {
        StorageError::is_transient(self)
    }
}

impl Transient for TranscriptionError {
    fn is_transient(&self) -> bool {
        TranscriptionError::is_transient(self)
    }
}

impl Transient for FetchError {
    fn is_transient(&self) -> bool {
        FetchError::is_transient(self)
    }
}

impl Transient for SummaryError {
    fn is_transient(&self) -> bool {
        SummaryError::is_transient(self)
    }
}

impl Transient for TranscodeError {
    fn is_transient(&self) -> bool {
        false
    }
}

impl Transient for EncodeError {
    fn is_transient(&self) -> bool {
        false
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Transcode failed: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("Upload failed: {0}")]
    Upload(#[from] StorageError),

    #[error("Transcription failed: {0}")]
    Transcription(#[from] TranscriptionError),

    #[error("Scoring failed during {stage}: {source}")]
    Scoring {
        stage: Stage,
        #[source]
        source: ScoringError,
    },

    #[error("Summary failed: {0}")]
    Summary(#[from] SummaryError),

    #[error("Stage {stage} timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },

    #[error("Request cancelled during {stage}")]
    Cancelled { stage: Stage },

    #[error("Workspace I/O failed during {stage}: {source}")]
    Workspace {
        stage: Stage,
        #[source]
        source: io::Error,
    },

    #[error("Invalid stage transition from {from:?} to {to}")]
    InvalidTransition { from: PipelineState, to: Stage },

    #[error("Internal pipeline error during {stage}: {message}")]
    Internal { stage: Stage, message: String },
}

impl From<FetchError> for PipelineError {
    fn from(err: FetchError) -> Self {
        PipelineError::Transcription(TranscriptionError::Download(err))
    }
}

impl From<EncodeError> for PipelineError {
    fn from(err: EncodeError) -> Self {
        PipelineError::Transcode(TranscodeError::Encode(err))
    }
}

impl Transient for PipelineError {
    fn is_transient(&self) -> bool {
        match self {
            PipelineError::Upload(e) => e.is_transient(),
            PipelineError::Transcription(e) => e.is_transient(),
            PipelineError::Summary(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl PipelineError {
    /// Stage the failure belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Validation(_) => Stage::Validating,
            PipelineError::Transcode(_) => Stage::Transcoding,
            PipelineError::Upload(_) => Stage::Uploading,
            PipelineError::Transcription(_) => Stage::Transcribing,
            PipelineError::Summary(_) => Stage::Summarizing,
            PipelineError::Scoring { stage, .. }
            | PipelineError::Timeout { stage, .. }
            | PipelineError::Cancelled { stage }
            | PipelineError::Workspace { stage, .. }
            | PipelineError::Internal { stage, .. } => *stage,
            PipelineError::InvalidTransition { to, .. } => *to,
        }
    }

    /// Service-level error with the HTTP semantics of this failure.
    pub fn to_app_error(&self) -> AppError {
        match self {
            PipelineError::Validation(e) => match e {
                ValidationError::FileTooLarge { .. } => AppError::PayloadTooLarge(e.to_string()),
                ValidationError::UnsupportedMediaKind { .. } => {
                    AppError::UnsupportedMediaType(e.to_string())
                }
                _ => AppError::InvalidInput(e.to_string()),
            },
            PipelineError::Transcode(e) => AppError::MediaConversion(e.to_string()),
            PipelineError::Upload(e) => AppError::Storage(e.to_string()),
            PipelineError::Transcription(e) => match e {
                TranscriptionError::NotConfigured => {
                    AppError::ServiceUnavailable(e.to_string())
                }
                TranscriptionError::Download(FetchError::TooLarge { .. }) => {
                    AppError::PayloadTooLarge(e.to_string())
                }
                TranscriptionError::Download(FetchError::Empty) => {
                    AppError::InvalidInput(e.to_string())
                }
                TranscriptionError::Download(FetchError::Status(status))
                    if (400..500).contains(status) =>
                {
                    AppError::BadRequest(e.to_string())
                }
                _ => AppError::Transcription(e.to_string()),
            },
            PipelineError::Scoring {
                stage: Stage::Validating,
                source,
            } => AppError::InvalidReference(source.to_string()),
            PipelineError::Scoring {
                source: source @ ScoringError::AlignmentTooLarge { .. },
                ..
            } => AppError::PayloadTooLarge(source.to_string()),
            PipelineError::Scoring { source, .. } => AppError::Scoring(source.to_string()),
            PipelineError::Summary(SummaryError::NotConfigured) => {
                AppError::ServiceUnavailable(self.to_string())
            }
            PipelineError::Summary(e) => AppError::Summary(e.to_string()),
            PipelineError::Timeout { stage, after } => AppError::Timeout {
                stage: stage.to_string(),
                seconds: after.as_secs_f64(),
            },
            PipelineError::Cancelled { stage } => AppError::Cancelled(stage.to_string()),
            PipelineError::Workspace { .. }
            | PipelineError::InvalidTransition { .. }
            | PipelineError::Internal { .. } => AppError::Internal(self.to_string()),
        }
    }
}
