//! Timeout, retry and cancellation policy applied to every stage operation.

use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{PipelineError, Transient};
use crate::stage::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePolicy {
    /// Budget for a single attempt.
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
    /// Instant no attempt or backoff may run past.
    pub deadline: Option<Instant>,
}

impl StagePolicy {
    /// One retry of transient failures after `backoff`.
    pub fn new(timeout: Duration, backoff: Duration) -> Self {
        Self {
            timeout,
            max_retries: 1,
            backoff,
            deadline: None,
        }
    }

    pub fn without_retry(timeout: Duration) -> Self {
        Self {
            timeout,
            max_retries: 0,
            backoff: Duration::ZERO,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Bound for the next attempt, or `None` once the deadline has passed.
    fn attempt_timeout(&self) -> Option<Duration> {
        match self.deadline {
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                (!left.is_zero()).then(|| self.timeout.min(left))
            }
            None => Some(self.timeout),
        }
    }
}

/// Run `op` for `stage` under `policy`.
///
/// - A token cancelled before the stage starts fails with `Cancelled` and `op`
///   is never called.
/// - Each attempt is bounded by `policy.timeout` and by whatever is left before
///   `policy.deadline`; a timeout is never retried.
/// - Transient failures are retried up to `policy.max_retries` times after
///   sleeping `policy.backoff`. A retry that would start at or past the
///   deadline fails with `Timeout` instead.
/// - Cancellation while an attempt or backoff is pending drops the attempt and
///   fails with `Cancelled`.
pub async fn run_stage<T, E, F, Fut>(
    stage: Stage,
    policy: &StagePolicy,
    token: &CancellationToken,
    mut op: F,
) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Into<PipelineError>,
{
    let mut attempt: u32 = 0;
    loop {
        if token.is_cancelled() {
            return Err(PipelineError::Cancelled { stage });
        }
        let Some(attempt_timeout) = policy.attempt_timeout() else {
            tracing::warn!(stage = %stage, attempt, "Stage deadline passed before attempt");
            return Err(PipelineError::Timeout {
                stage,
                after: policy.timeout,
            });
        };
        attempt += 1;
        let start = Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(PipelineError::Cancelled { stage }),
            outcome = tokio::time::timeout(attempt_timeout, op()) => outcome,
        };

        // An attempt that finished after cancellation is discarded.
        if token.is_cancelled() {
            return Err(PipelineError::Cancelled { stage });
        }

        match outcome {
            Err(_) => {
                tracing::warn!(
                    stage = %stage,
                    attempt,
                    timeout_ms = attempt_timeout.as_millis() as u64,
                    "Stage attempt timed out"
                );
                return Err(PipelineError::Timeout {
                    stage,
                    after: policy.timeout,
                });
            }
            Ok(Ok(value)) => {
                tracing::debug!(
                    stage = %stage,
                    attempt,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Stage attempt succeeded"
                );
                return Ok(value);
            }
            Ok(Err(err)) if err.is_transient() && attempt <= policy.max_retries => {
                let err: PipelineError = err.into();
                tracing::warn!(
                    stage = %stage,
                    attempt,
                    backoff_ms = policy.backoff.as_millis() as u64,
                    error = %err,
                    "Transient stage failure, retrying"
                );
                let backoff = policy
                    .attempt_timeout()
                    .map_or(Duration::ZERO, |left| policy.backoff.min(left));
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(PipelineError::Cancelled { stage }),
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
            Ok(Err(err)) => return Err(err.into()),
        }
    }
}
