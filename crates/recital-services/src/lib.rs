//! Recital Services Library
//!
//! Thin HTTP clients for the external capabilities the pipeline consumes:
//! speech recognition, language-model completion and remote media download.
//! Each capability is a narrow trait so the pipeline and its tests can swap
//! implementations.

pub mod asr;
pub mod fetch;
pub mod llm;

pub use asr::{CloudflareWhisper, DisabledTranscriber, Transcriber, TranscriptionError};
pub use fetch::{FetchError, FetchedMedia, HttpMediaFetcher, MediaFetcher};
pub use llm::{ChatCompletionClient, Completion, SummaryError, SummaryRequest, Summarizer};

/// Status codes worth one more try: server errors, rate limiting and timeouts.
pub(crate) fn is_transient_status(status: u16) -> bool {
    status >= 500 || status == 429 || status == 408
}
