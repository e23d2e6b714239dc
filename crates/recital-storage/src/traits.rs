//! Storage abstraction trait

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// Whether a retry of the same upload may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::UploadFailed(_) | StorageError::BackendError(_)
        )
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage capability
///
/// Backends write an artifact under a caller-supplied key (see
/// [`crate::keys`]) and return the URL clients use to fetch it. Existing
/// objects are never overwritten.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` at `storage_key` and return its public URL.
    async fn store(&self, storage_key: &str, data: Bytes, content_type: &str)
        -> StorageResult<String>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
