//! Shared key generation for storage backends.
//!
//! Key format: `{media_kind}/{uuid}.{ext}`.

use recital_core::MediaKind;
use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

/// Generate a fresh storage key for an artifact of `kind` with extension `ext`.
pub fn generate_storage_key(kind: MediaKind, ext: &str) -> String {
    format!(
        "{}/{}.{}",
        kind.as_str(),
        Uuid::new_v4(),
        ext.trim_start_matches('.').to_lowercase()
    )
}

/// Reject keys that could escape a backend's root or address a directory.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.ends_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
