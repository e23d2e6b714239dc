//! Error types module
//!
//! `AppError` is the service-level error every pipeline failure is mapped to
//! before it reaches a client. Each variant describes its own HTTP response
//! through [`ErrorMetadata`].

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected errors like validation failures
    Debug,
    /// Recoverable issues like a degraded capability
    Warn,
    /// Unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "TRANSCODE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Invalid reference text: {0}")]
    InvalidReference(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Media conversion error: {0}")]
    MediaConversion(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Scoring error: {0}")]
    Scoring(String),

    #[error("Summary error: {0}")]
    Summary(String),

    #[error("Stage {stage} timed out after {seconds:.1}s")]
    Timeout { stage: String, seconds: f64 },

    #[error("Request cancelled during {0}")]
    Cancelled(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::BadRequest(_) => (
            400,
            "BAD_REQUEST",
            false,
            Some("Check request format and parameters"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce file size and upload again"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnsupportedMediaType(_) => (
            415,
            "UNSUPPORTED_MEDIA_TYPE",
            false,
            Some("Upload an audio or video file"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidReference(_) => (
            422,
            "INVALID_REFERENCE_TEXT",
            false,
            Some("Provide a reference text containing at least one word"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Check API key"),
            false,
            LogLevel::Debug,
        ),
        AppError::MediaConversion(_) => (
            500,
            "MEDIA_CONVERSION_ERROR",
            false,
            Some("Try a different file or a shorter recording"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            502,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Transcription(_) => (
            502,
            "TRANSCRIPTION_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Scoring(_) => (
            500,
            "SCORING_ERROR",
            false,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
        ),
        AppError::Summary(_) => (
            502,
            "SUMMARY_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Warn,
        ),
        AppError::Timeout { .. } => (
            504,
            "STAGE_TIMEOUT",
            true,
            Some("Retry with a shorter recording"),
            false,
            LogLevel::Warn,
        ),
        AppError::Cancelled(_) => (
            503,
            "REQUEST_CANCELLED",
            true,
            Some("Resend the request"),
            false,
            LogLevel::Debug,
        ),
        AppError::ServiceUnavailable(_) => (
            503,
            "SERVICE_UNAVAILABLE",
            true,
            Some("Retry later or contact the operator"),
            false,
            LogLevel::Warn,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::BadRequest(_) => "BadRequest",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::UnsupportedMediaType(_) => "UnsupportedMediaType",
            AppError::InvalidReference(_) => "InvalidReference",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::MediaConversion(_) => "MediaConversion",
            AppError::Storage(_) => "Storage",
            AppError::Transcription(_) => "Transcription",
            AppError::Scoring(_) => "Scoring",
            AppError::Summary(_) => "Summary",
            AppError::Timeout { .. } => "Timeout",
            AppError::Cancelled(_) => "Cancelled",
            AppError::ServiceUnavailable(_) => "ServiceUnavailable",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidInput(ref msg)
            | AppError::BadRequest(ref msg)
            | AppError::PayloadTooLarge(ref msg)
            | AppError::UnsupportedMediaType(ref msg)
            | AppError::InvalidReference(ref msg)
            | AppError::Unauthorized(ref msg)
            | AppError::ServiceUnavailable(ref msg) => msg.clone(),
            AppError::MediaConversion(_) => "Failed to process media data".to_string(),
            AppError::Storage(_) => "Failed to store processed media".to_string(),
            AppError::Transcription(_) => "Speech recognition failed".to_string(),
            AppError::Scoring(_) => "Failed to score recitation".to_string(),
            AppError::Summary(_) => "Summary generation failed".to_string(),
            AppError::Timeout { stage, seconds } => {
                format!("Stage {} exceeded its {:.0}s budget", stage, seconds)
            }
            AppError::Cancelled(stage) => format!("Request cancelled during {}", stage),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}
