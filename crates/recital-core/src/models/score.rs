use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Tolerance used when checking whether the scoring weights sum to one.
pub const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Relative weights of the three sub-scores in the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScoringWeights {
    pub accuracy: f64,
    pub fluency: f64,
    pub pronunciation: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            accuracy: 0.3,
            fluency: 0.3,
            pronunciation: 0.4,
        }
    }
}

impl ScoringWeights {
    pub fn total(&self) -> f64 {
        self.accuracy + self.fluency + self.pronunciation
    }

    /// Rejects negative, non-finite or all-zero weights.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("accuracy", self.accuracy),
            ("fluency", self.fluency),
            ("pronunciation", self.pronunciation),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!(
                    "{} weight must be a finite non-negative number, got {}",
                    name, value
                ));
            }
        }
        if self.total() <= 0.0 {
            return Err("scoring weights must not all be zero".to_string());
        }
        Ok(())
    }

    pub fn needs_renormalization(&self) -> bool {
        (self.total() - 1.0).abs() > WEIGHT_SUM_EPSILON
    }

    /// Copy scaled so the three weights sum to one. Returned unchanged when the
    /// sum is already within [`WEIGHT_SUM_EPSILON`] of one.
    pub fn normalized(&self) -> ScoringWeights {
        if !self.needs_renormalization() {
            return *self;
        }
        let total = self.total();
        ScoringWeights {
            accuracy: self.accuracy / total,
            fluency: self.fluency / total,
            pronunciation: self.pronunciation / total,
        }
    }
}

/// Recitation quality, every field in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScoreBreakdown {
    pub accuracy: f64,
    pub fluency: f64,
    pub pronunciation: f64,
    pub overall: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentOp {
    Match,
    Substitution,
    Insertion,
    Deletion,
}

/// One step of a word alignment. Insertions carry no reference index and
/// deletions carry no hypothesis index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentEntry {
    pub op: AlignmentOp,
    pub reference_index: Option<usize>,
    pub hypothesis_index: Option<usize>,
    pub similarity: f64,
}

/// Word alignment between a reference and a hypothesis, in sequence order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub entries: Vec<AlignmentEntry>,
}

impl AlignmentResult {
    fn pairs(&self, op: AlignmentOp) -> Vec<(Option<usize>, Option<usize>)> {
        self.entries
            .iter()
            .filter(|e| e.op == op)
            .map(|e| (e.reference_index, e.hypothesis_index))
            .collect()
    }

    pub fn matches(&self) -> Vec<(Option<usize>, Option<usize>)> {
        self.pairs(AlignmentOp::Match)
    }

    pub fn substitutions(&self) -> Vec<(Option<usize>, Option<usize>)> {
        self.pairs(AlignmentOp::Substitution)
    }

    pub fn insertions(&self) -> Vec<(Option<usize>, Option<usize>)> {
        self.pairs(AlignmentOp::Insertion)
    }

    pub fn deletions(&self) -> Vec<(Option<usize>, Option<usize>)> {
        self.pairs(AlignmentOp::Deletion)
    }

    pub fn count(&self, op: AlignmentOp) -> usize {
        self.entries.iter().filter(|e| e.op == op).count()
    }
}

/// Per-word outcome of the alignment, with timing when the recognizer gave it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WordDetail {
    pub op: AlignmentOp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_word: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hypothesis_word: Option<String>,
    pub similarity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AlignmentCounts {
    pub matches: usize,
    pub substitutions: usize,
    pub insertions: usize,
    pub deletions: usize,
}

/// Full output of the scoring engine for one recitation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScoreReport {
    pub breakdown: ScoreBreakdown,
    /// Weights actually applied to the overall score.
    pub weights: ScoringWeights,
    pub renormalized_weights: bool,
    pub counts: AlignmentCounts,
    pub reference_word_count: usize,
    pub hypothesis_word_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaking_rate_wpm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_pause_seconds: Option<f64>,
    pub long_pauses: usize,
    pub word_details: Vec<WordDetail>,
    pub mispronounced_words: Vec<String>,
    pub missing_words: Vec<String>,
    pub extra_words: Vec<String>,
}
