use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::error::PipelineError;

/// Pipeline stages in their fixed execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Validating,
    Transcoding,
    Uploading,
    Transcribing,
    Scoring,
    Summarizing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validating => "validating",
            Stage::Transcoding => "transcoding",
            Stage::Uploading => "uploading",
            Stage::Transcribing => "transcribing",
            Stage::Scoring => "scoring",
            Stage::Summarizing => "summarizing",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Pending,
    Running(Stage),
    Completed,
    Failed { stage: Stage, cause: String },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Failed { .. })
    }
}

/// State machine for one request.
///
/// Stages only move forward. Stages may be skipped but never re-entered, and
/// nothing moves after `Completed` or `Failed`.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    state: PipelineState,
    history: Vec<Stage>,
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineRun {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Pending,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Stages entered so far, in order.
    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    pub fn current_stage(&self) -> Option<Stage> {
        match self.state {
            PipelineState::Running(stage) => Some(stage),
            PipelineState::Failed { stage, .. } => Some(stage),
            _ => None,
        }
    }

    pub fn advance(&mut self, next: Stage) -> Result<(), PipelineError> {
        let allowed = match &self.state {
            PipelineState::Pending => true,
            PipelineState::Running(current) => next > *current,
            PipelineState::Completed | PipelineState::Failed { .. } => false,
        };
        if !allowed {
            return Err(PipelineError::InvalidTransition {
                from: self.state.clone(),
                to: next,
            });
        }

        tracing::debug!(stage = %next, "Entering stage");
        self.state = PipelineState::Running(next);
        self.history.push(next);
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), PipelineError> {
        if self.state.is_terminal() {
            return Err(PipelineError::InvalidTransition {
                from: self.state.clone(),
                to: self.history.last().copied().unwrap_or(Stage::Validating),
            });
        }
        self.state = PipelineState::Completed;
        Ok(())
    }

    /// Record a failure in the current stage. A run that already ended keeps its state.
    pub fn fail(&mut self, cause: &PipelineError) {
        if self.state.is_terminal() {
            return;
        }
        let stage = self.current_stage().unwrap_or_else(|| cause.stage());
        self.state = PipelineState::Failed {
            stage,
            cause: cause.to_string(),
        };
    }
}
