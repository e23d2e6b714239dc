//! Recital Core Library
//!
//! This crate provides the domain models, error types and configuration shared
//! by every Recital component: the transcoder, the scoring engine, the
//! capability clients, the pipeline orchestrator and the HTTP service.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{
    AsrConfig, AuthConfig, Config, ConfigError, LlmConfig, MediaConfig, PipelineConfig,
    RecitalConfig, ScoringConfig, SecretString, ServerConfig, StorageConfig, TranscodeConfig,
};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::*;
pub use storage_types::StorageBackend;
