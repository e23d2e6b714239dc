//! Recital Scoring Library
//!
//! Pure text alignment and recitation scoring. Nothing in this crate performs
//! I/O; identical inputs always produce identical reports.

pub mod alignment;
pub mod feedback;
pub mod normalize;
pub mod scoring;
pub mod similarity;

pub use alignment::align;
pub use feedback::suggestions;
pub use normalize::{normalize_text, tokenize};
pub use scoring::{
    ensure_reference, hypothesis_words, score, score_words, HypothesisWord, ScoringError,
    MAX_ALIGNMENT_CELLS, MAX_REFERENCE_WORDS,
};
pub use similarity::similarity;
