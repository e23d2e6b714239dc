//! Recital Storage Library
//!
//! Object storage for processed recordings. Backends implement the narrow
//! [`Storage`] trait; the orchestrator only ever stores a finished artifact and
//! hands its public URL back to the client.
//!
//! # Storage key format
//!
//! Every backend uses the same layout: `{media_kind}/{uuid}.{ext}`, for example
//! `audio/5f0c...e1.mp3`. Keys are generated once per artifact and never
//! reused, so stored objects are immutable. Key generation lives in the
//! [`keys`] module.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::generate_storage_key;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use recital_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
