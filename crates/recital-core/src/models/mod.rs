pub mod analysis;
pub mod media;
pub mod score;
pub mod transcript;

pub use analysis::{
    AnalysisRequest, AnalysisResult, CompletionRequest, CompletionResponse, StageTiming,
};
pub use media::{
    content_type_for_extension, CompressionPlan, MediaAsset, MediaKind, MediaProcessingResult,
    MediaSummary,
};
pub use score::{
    AlignmentCounts, AlignmentEntry, AlignmentOp, AlignmentResult, ScoreBreakdown, ScoreReport,
    ScoringWeights, WordDetail, WEIGHT_SUM_EPSILON,
};
pub use transcript::{TranscriptSegment, TranscriptionResult};
