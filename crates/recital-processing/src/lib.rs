//! Recital Processing Library
//!
//! Everything that touches the recording itself before it leaves the host:
//! upload validation, the per-request workspace, the encoding capability
//! (FFmpeg in production), the adaptive size-targeting transcoder and the
//! pool that bounds concurrent encodes.

pub mod encoder;
pub mod pool;
pub mod transcoder;
pub mod validator;
pub mod workspace;

pub use encoder::{
    EncodeError, EncodeJob, EncodeOutput, EncodeProfile, Encoder, FfmpegEncoder, FfprobeProber,
    MediaProbe, MediaProber,
};
pub use pool::TranscodePool;
pub use transcoder::{AdaptiveTranscoder, TranscodeError, TranscodeOutcome};
pub use validator::{MediaValidator, ValidationError};
pub use workspace::Workspace;
