//! API constants

/// Versioned prefix of every pipeline route.
pub const API_PREFIX: &str = "/api/v1";

pub const OPENAPI_PATH: &str = "/api/openapi.json";

pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Multipart field carrying the uploaded recording.
pub const UPLOAD_FIELD: &str = "file";

/// Room for multipart framing on top of `MAX_FILE_SIZE`.
pub const UPLOAD_BODY_HEADROOM: usize = 1024 * 1024;
