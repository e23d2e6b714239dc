//! Recital Pipeline Library
//!
//! Drives one request through its stages: validation, transcoding, upload,
//! transcription, scoring and summarizing. Every stage runs under a timeout,
//! transient capability failures get a single retry, and a cancelled request
//! stops before its next stage. Request files live in a [`Workspace`] that is
//! removed however the request ends.
//!
//! [`Workspace`]: recital_processing::Workspace

pub mod error;
pub mod orchestrator;
pub mod policy;
pub mod prompt;
pub mod stage;

pub use error::{PipelineError, Transient};
pub use orchestrator::{Capabilities, Orchestrator, PipelineSettings, UploadInput};
pub use policy::{run_stage, StagePolicy};
pub use prompt::build_summary_prompt;
pub use stage::{PipelineRun, PipelineState, Stage};
pub use tokio_util::sync::CancellationToken;
