//! Recitation scoring over an alignment of the reference and the transcript.

use recital_core::{
    AlignmentCounts, AlignmentOp, AlignmentResult, ScoreBreakdown, ScoreReport, ScoringConfig,
    TranscriptionResult, WordDetail,
};

use crate::alignment::align;
use crate::normalize::tokenize;

/// Pause score when fewer than two words carry timing.
const NEUTRAL_PAUSE_SCORE: f64 = 0.8;
const RATE_WEIGHT: f64 = 0.7;
const PAUSE_WEIGHT: f64 = 0.3;
/// wpm outside the ideal band at which the rate score bottoms out.
const RATE_DEVIATION_SPAN: f64 = 200.0;
const MIN_SUB_SCORE: f64 = 0.1;
/// Longest reference accepted for alignment.
pub const MAX_REFERENCE_WORDS: usize = 5_000;
/// Upper bound on reference x hypothesis words handed to the aligner.
pub const MAX_ALIGNMENT_CELLS: usize = 25_000_000;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("Reference text contains no words")]
    EmptyReference,

    #[error("Invalid scoring weights: {0}")]
    InvalidWeights(String),

    #[error("Reference text has {words} words, at most {max} are supported")]
    ReferenceTooLong { words: usize, max: usize },

    #[error("Transcript of {hypothesis} words is too long to align against {reference} reference words")]
    AlignmentTooLarge { reference: usize, hypothesis: usize },
}

/// One recognized word, with the timing and confidence of the segment it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct HypothesisWord {
    pub text: String,
    pub start_ms: Option<u64>,
    pub end_ms: Option<u64>,
    pub confidence: Option<f64>,
}

impl HypothesisWord {
    pub fn untimed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start_ms: None,
            end_ms: None,
            confidence: None,
        }
    }

    fn timing(&self) -> Option<(u64, u64)> {
        Some((self.start_ms?, self.end_ms?))
    }
}

/// Tokenize the reference, failing when nothing scorable is left.
pub fn ensure_reference(reference_text: &str) -> Result<Vec<String>, ScoringError> {
    let words = tokenize(reference_text);
    if words.is_empty() {
        return Err(ScoringError::EmptyReference);
    }
    if words.len() > MAX_REFERENCE_WORDS {
        return Err(ScoringError::ReferenceTooLong {
            words: words.len(),
            max: MAX_REFERENCE_WORDS,
        });
    }
    Ok(words)
}

/// Split a transcript into hypothesis words. Tokens inherit the timing and
/// confidence of their segment; untimed transcripts fall back to the text.
pub fn hypothesis_words(transcript: &TranscriptionResult) -> Vec<HypothesisWord> {
    if !transcript.has_segments() {
        return tokenize(&transcript.text)
            .into_iter()
            .map(HypothesisWord::untimed)
            .collect();
    }

    transcript
        .segments
        .iter()
        .flat_map(|segment| {
            tokenize(&segment.text)
                .into_iter()
                .map(move |text| HypothesisWord {
                    text,
                    start_ms: Some(segment.start_ms),
                    end_ms: Some(segment.end_ms),
                    confidence: segment.confidence,
                })
        })
        .collect()
}

/// Score a transcript against the reference text.
pub fn score(
    reference_text: &str,
    transcript: &TranscriptionResult,
    config: &ScoringConfig,
) -> Result<ScoreReport, ScoringError> {
    let reference = ensure_reference(reference_text)?;
    let hypothesis = hypothesis_words(transcript);
    score_words(&reference, &hypothesis, config)
}

pub fn score_words(
    reference: &[String],
    hypothesis: &[HypothesisWord],
    config: &ScoringConfig,
) -> Result<ScoreReport, ScoringError> {
    config
        .weights
        .validate()
        .map_err(ScoringError::InvalidWeights)?;
    if reference.is_empty() {
        return Err(ScoringError::EmptyReference);
    }
    if reference.len().saturating_mul(hypothesis.len()) > MAX_ALIGNMENT_CELLS {
        return Err(ScoringError::AlignmentTooLarge {
            reference: reference.len(),
            hypothesis: hypothesis.len(),
        });
    }

    let hypothesis_text: Vec<String> = hypothesis.iter().map(|w| w.text.clone()).collect();
    let alignment = align(reference, &hypothesis_text, config.min_word_similarity);

    let counts = AlignmentCounts {
        matches: alignment.count(AlignmentOp::Match),
        substitutions: alignment.count(AlignmentOp::Substitution),
        insertions: alignment.count(AlignmentOp::Insertion),
        deletions: alignment.count(AlignmentOp::Deletion),
    };

    let accuracy = counts.matches as f64 / reference.len().max(1) as f64;
    let timing = Timing::measure(hypothesis, config);
    let fluency = timing.fluency(config);
    let pronunciation = pronunciation(&alignment, hypothesis, config.substitution_penalty);

    let renormalized_weights = config.weights.needs_renormalization();
    let weights = config.weights.normalized();
    let overall = (weights.accuracy * accuracy
        + weights.fluency * fluency
        + weights.pronunciation * pronunciation)
        .clamp(0.0, 1.0);

    let breakdown = ScoreBreakdown {
        accuracy: accuracy.clamp(0.0, 1.0),
        fluency,
        pronunciation,
        overall,
    };

    tracing::debug!(
        reference_words = reference.len(),
        hypothesis_words = hypothesis.len(),
        matches = counts.matches,
        overall,
        "Recitation scored"
    );

    let word_of = |index: Option<usize>, words: &[String]| index.map(|i| words[i].clone());
    let mut mispronounced_words = Vec::new();
    let mut missing_words = Vec::new();
    let mut extra_words = Vec::new();
    let word_details = alignment
        .entries
        .iter()
        .map(|entry| {
            let reference_word = word_of(entry.reference_index, reference);
            let hypothesis_word = word_of(entry.hypothesis_index, &hypothesis_text[..]);
            match entry.op {
                AlignmentOp::Substitution => mispronounced_words.extend(reference_word.clone()),
                AlignmentOp::Deletion => missing_words.extend(reference_word.clone()),
                AlignmentOp::Insertion => extra_words.extend(hypothesis_word.clone()),
                AlignmentOp::Match => {}
            }
            let timed = entry.hypothesis_index.map(|i| &hypothesis[i]);
            WordDetail {
                op: entry.op,
                reference_word,
                hypothesis_word,
                similarity: entry.similarity,
                start_ms: timed.and_then(|w| w.start_ms),
                end_ms: timed.and_then(|w| w.end_ms),
            }
        })
        .collect();

    Ok(ScoreReport {
        breakdown,
        weights,
        renormalized_weights,
        counts,
        reference_word_count: reference.len(),
        hypothesis_word_count: hypothesis.len(),
        speaking_rate_wpm: timing.wpm,
        average_pause_seconds: timing.average_pause_seconds,
        long_pauses: timing.long_pauses,
        word_details,
        mispronounced_words,
        missing_words,
        extra_words,
    })
}

/// Pace facts derived from word timings.
#[derive(Debug, Default)]
struct Timing {
    timed_words: usize,
    span_seconds: f64,
    wpm: Option<f64>,
    average_pause_seconds: Option<f64>,
    long_pauses: usize,
}

impl Timing {
    fn measure(hypothesis: &[HypothesisWord], config: &ScoringConfig) -> Timing {
        let timed: Vec<(u64, u64)> = hypothesis.iter().filter_map(HypothesisWord::timing).collect();
        let (Some(first), Some(last)) = (timed.first(), timed.last()) else {
            return Timing::default();
        };

        let span_seconds = last.1.saturating_sub(first.0) as f64 / 1000.0;
        let wpm = (span_seconds > 0.0).then(|| timed.len() as f64 / (span_seconds / 60.0));

        let gaps: Vec<f64> = timed
            .windows(2)
            .map(|w| w[1].0.saturating_sub(w[0].1) as f64 / 1000.0)
            .collect();
        let average_pause_seconds =
            (!gaps.is_empty()).then(|| gaps.iter().sum::<f64>() / gaps.len() as f64);
        let long_pauses = gaps
            .iter()
            .filter(|gap| **gap > config.long_pause_seconds)
            .count();

        Timing {
            timed_words: timed.len(),
            span_seconds,
            wpm,
            average_pause_seconds,
            long_pauses,
        }
    }

    fn fluency(&self, config: &ScoringConfig) -> f64 {
        if self.timed_words == 0 {
            return 1.0;
        }
        let fluency = RATE_WEIGHT * self.rate_score(config) + PAUSE_WEIGHT * self.pause_score();
        fluency.clamp(0.0, 1.0)
    }

    fn rate_score(&self, config: &ScoringConfig) -> f64 {
        let Some(wpm) = self.wpm.filter(|_| self.span_seconds > 0.0) else {
            return 1.0;
        };
        let deviation = if wpm < config.ideal_wpm_min {
            config.ideal_wpm_min - wpm
        } else if wpm > config.ideal_wpm_max {
            wpm - config.ideal_wpm_max
        } else {
            return 1.0;
        };
        (1.0 - deviation / RATE_DEVIATION_SPAN).max(MIN_SUB_SCORE)
    }

    fn pause_score(&self) -> f64 {
        let Some(avg) = self.average_pause_seconds else {
            return NEUTRAL_PAUSE_SCORE;
        };
        let long = self.long_pauses;
        if avg < 0.5 && long == 0 {
            1.0
        } else if avg < 1.0 && long <= 2 {
            0.8
        } else if avg < 2.0 && long <= 5 {
            0.6
        } else {
            (0.4 - 0.05 * long as f64).max(MIN_SUB_SCORE)
        }
    }
}

/// Mean confidence over aligned words, with substitutions penalized. The
/// alignment similarity stands in for confidence when the recognizer gave none.
fn pronunciation(
    alignment: &AlignmentResult,
    hypothesis: &[HypothesisWord],
    substitution_penalty: f64,
) -> f64 {
    let values: Vec<f64> = alignment
        .entries
        .iter()
        .filter_map(|entry| {
            let scale = match entry.op {
                AlignmentOp::Match => 1.0,
                AlignmentOp::Substitution => 1.0 - substitution_penalty,
                AlignmentOp::Insertion | AlignmentOp::Deletion => return None,
            };
            let confidence = entry
                .hypothesis_index
                .and_then(|i| hypothesis[i].confidence)
                .unwrap_or(entry.similarity)
                .clamp(0.0, 1.0);
            Some(confidence * scale)
        })
        .collect();

    if values.is_empty() {
        return 0.0;
    }
    (values.iter().sum::<f64>() / values.len() as f64).clamp(0.0, 1.0)
}
