//! Media processing and recitation analysis flows.

use bytes::Bytes;
use chrono::Utc;
use recital_core::{
    AnalysisRequest, AnalysisResult, Config, ErrorMetadata, LogLevel, MediaAsset, MediaConfig,
    MediaKind, MediaProcessingResult, MediaSummary, PipelineConfig, ScoringConfig, StageTiming,
    StorageBackend, TranscodeConfig,
};
use recital_processing::validator::extension_of;
use recital_processing::{
    AdaptiveTranscoder, EncodeJob, EncodeProfile, Encoder, MediaProbe, MediaProber, MediaValidator,
    TranscodeOutcome, TranscodePool, Workspace,
};
use recital_scoring::{ensure_reference, hypothesis_words, score_words, suggestions};
use recital_services::{
    Completion, MediaFetcher, SummaryError, SummaryRequest, Summarizer, Transcriber,
};
use recital_storage::{generate_storage_key, Storage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::policy::{run_stage, StagePolicy};
use crate::prompt::build_summary_prompt;
use crate::stage::{PipelineRun, Stage};

/// Bytes inspected for container signatures.
const SNIFF_LEN: usize = 32;
const FALLBACK_EXTENSION: &str = "bin";

/// Immutable settings the orchestrator is built with.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_file_size: u64,
    pub temp_dir: PathBuf,
    pub transcode: TranscodeConfig,
    pub scoring: ScoringConfig,
    pub stages: PipelineConfig,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let media = MediaConfig::default();
        Self {
            max_file_size: media.max_file_size,
            temp_dir: media.temp_dir,
            transcode: TranscodeConfig::default(),
            scoring: ScoringConfig::default(),
            stages: PipelineConfig::default(),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_file_size: config.max_file_size(),
            temp_dir: config.temp_dir().to_path_buf(),
            transcode: config.transcode().clone(),
            scoring: config.scoring().clone(),
            stages: config.pipeline().clone(),
        }
    }
}

/// External capabilities the pipeline drives.
#[derive(Clone)]
pub struct Capabilities {
    pub storage: Arc<dyn Storage>,
    pub transcriber: Arc<dyn Transcriber>,
    pub summarizer: Option<Arc<dyn Summarizer>>,
    pub fetcher: Arc<dyn MediaFetcher>,
    pub encoder: Arc<dyn Encoder>,
    pub prober: Arc<dyn MediaProber>,
}

/// An uploaded recording as received by the HTTP layer.
#[derive(Debug, Clone)]
pub struct UploadInput {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Deadline shared by the stages of one analysis.
#[derive(Debug, Clone, Copy)]
struct Budget {
    deadline: Instant,
    total: Duration,
}

impl Budget {
    fn new(total: Duration) -> Self {
        Self {
            deadline: Instant::now() + total,
            total,
        }
    }

    fn remaining(&self, stage: Stage) -> Result<Duration, PipelineError> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(PipelineError::Timeout {
                stage,
                after: self.total,
            });
        }
        Ok(remaining)
    }

    /// Sub-budget for one stage: its own timeout, cut short by what is left overall.
    fn narrow(&self, stage: Stage, stage_timeout: Duration) -> Result<Budget, PipelineError> {
        let total = stage_timeout.min(self.remaining(stage)?);
        Ok(Budget::new(total))
    }

    /// Retrying policy whose attempts and backoff all end by the deadline.
    fn policy(&self, stage: Stage, backoff: Duration) -> Result<StagePolicy, PipelineError> {
        Ok(StagePolicy::new(self.remaining(stage)?, backoff).with_deadline(self.deadline))
    }

    fn single_attempt(&self, stage: Stage) -> Result<StagePolicy, PipelineError> {
        Ok(StagePolicy::without_retry(self.remaining(stage)?).with_deadline(self.deadline))
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn timing(stage: Stage, start: Instant) -> StageTiming {
    StageTiming {
        stage: stage.to_string(),
        duration_ms: elapsed_ms(start),
    }
}

fn checkpoint(stage: Stage, token: &CancellationToken) -> Result<(), PipelineError> {
    if token.is_cancelled() {
        return Err(PipelineError::Cancelled { stage });
    }
    Ok(())
}

/// Extension the workspace copy of an input is saved under.
fn input_extension(filename: Option<&str>) -> String {
    filename
        .and_then(extension_of)
        .filter(|e| e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

/// Last path segment of a URL, ignoring query and fragment.
fn url_filename(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = rest.split(['?', '#']).next()?;
    let (_, path) = path.split_once('/')?;
    path.rsplit('/').next().filter(|s| !s.is_empty())
}

fn log_failure(err: &PipelineError) {
    let stage = err.stage();
    match err.to_app_error().log_level() {
        LogLevel::Debug => tracing::debug!(stage = %stage, error = %err, "Pipeline failed"),
        LogLevel::Warn => tracing::warn!(stage = %stage, error = %err, "Pipeline failed"),
        LogLevel::Error => tracing::error!(stage = %stage, error = %err, "Pipeline failed"),
    }
}

fn release(workspace: Workspace) {
    if let Err(e) = workspace.close() {
        tracing::warn!(error = %e, "Failed to remove request workspace");
    }
}

pub struct Orchestrator {
    caps: Capabilities,
    transcoder: AdaptiveTranscoder,
    validator: MediaValidator,
    pool: TranscodePool,
    settings: PipelineSettings,
}

impl Orchestrator {
    pub fn new(caps: Capabilities, settings: PipelineSettings) -> Self {
        let transcoder = AdaptiveTranscoder::new(caps.encoder.clone(), settings.transcode.clone());
        let validator = MediaValidator::new(settings.max_file_size);
        let pool = TranscodePool::new(settings.transcode.max_concurrent);
        Self {
            caps,
            transcoder,
            validator,
            pool,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.caps.storage.backend_type()
    }

    pub fn asr_configured(&self) -> bool {
        self.caps.transcriber.is_configured()
    }

    pub fn summarizer_configured(&self) -> bool {
        self.caps.summarizer.is_some()
    }

    fn finish<T>(run: &mut PipelineRun, result: &Result<T, PipelineError>) {
        match result {
            Ok(_) => {
                if let Err(e) = run.complete() {
                    tracing::warn!(error = %e, "Pipeline already terminated");
                }
                tracing::info!(stages = ?run.history(), "Pipeline completed");
            }
            Err(e) => {
                run.fail(e);
                log_failure(e);
            }
        }
    }

    /// Validate, transcode and store an uploaded recording.
    #[tracing::instrument(skip(self, input, token), fields(filename = ?input.filename, size_bytes = input.data.len()))]
    pub async fn process_media(
        &self,
        input: UploadInput,
        token: CancellationToken,
    ) -> Result<MediaProcessingResult, PipelineError> {
        let mut run = PipelineRun::new();
        let result = self.run_media(&mut run, input, &token).await;
        Self::finish(&mut run, &result);
        result
    }

    async fn run_media(
        &self,
        run: &mut PipelineRun,
        input: UploadInput,
        token: &CancellationToken,
    ) -> Result<MediaProcessingResult, PipelineError> {
        let backoff = self.settings.stages.retry_backoff;

        run.advance(Stage::Validating)?;
        checkpoint(Stage::Validating, token)?;
        let size = input.data.len() as u64;
        self.validator.validate_size(size)?;
        if let Some(name) = input.filename.as_deref() {
            self.validator.validate_filename(name)?;
        }
        let head = &input.data[..input.data.len().min(SNIFF_LEN)];
        let kind = self.validator.detect_kind(
            input.content_type.as_deref(),
            input.filename.as_deref(),
            head,
        )?;
        let ext = input_extension(input.filename.as_deref());
        let workspace = Workspace::allocate(&self.settings.temp_dir)
            .await
            .map_err(|source| PipelineError::Workspace {
                stage: Stage::Validating,
                source,
            })?;
        let input_path = workspace
            .write(&format!("input.{}", ext), &input.data)
            .await
            .map_err(|source| PipelineError::Workspace {
                stage: Stage::Validating,
                source,
            })?;
        drop(input);
        tracing::debug!(kind = %kind, size_bytes = size, "Upload validated");

        run.advance(Stage::Transcoding)?;
        let policy = StagePolicy::new(self.settings.stages.transcode_timeout, backoff);
        let (input_path, out_dir) = (input_path.as_path(), workspace.path());
        let outcome = run_stage(Stage::Transcoding, &policy, token, move || {
            self.transcode(kind, size, input_path, out_dir)
        })
        .await?;

        run.advance(Stage::Uploading)?;
        let data = tokio::fs::read(&outcome.artifact_path)
            .await
            .map_err(|source| PipelineError::Workspace {
                stage: Stage::Uploading,
                source,
            })?;
        let data = Bytes::from(data);
        let key = generate_storage_key(kind, outcome.extension());
        let content_type = kind.canonical_content_type();
        let policy = StagePolicy::new(self.settings.stages.upload_timeout, backoff);
        let (storage, key_ref) = (&self.caps.storage, key.as_str());
        let file_url = run_stage(Stage::Uploading, &policy, token, move || {
            storage.store(key_ref, data.clone(), content_type)
        })
        .await?;

        tracing::info!(
            storage_key = %key,
            original_size = size,
            processed_size = outcome.final_size_bytes,
            attempts = outcome.attempts,
            "Media processed"
        );
        release(workspace);

        Ok(MediaProcessingResult {
            success: true,
            file_url,
            file_type: kind,
            original_size: size,
            processed_size: outcome.final_size_bytes,
            compression_ratio: outcome.compression_ratio,
            message: outcome.message().to_string(),
        })
    }

    async fn transcode(
        &self,
        kind: MediaKind,
        size: u64,
        input_path: &Path,
        out_dir: &Path,
    ) -> Result<TranscodeOutcome, PipelineError> {
        let _permit = self
            .pool
            .acquire()
            .await
            .map_err(|e| PipelineError::Internal {
                stage: Stage::Transcoding,
                message: e.to_string(),
            })?;

        // Duration only matters for the bitrate search; a probe failure
        // surfaces as UnknownDuration if the search is needed.
        let probe = self
            .caps
            .prober
            .probe(input_path)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to probe upload");
                MediaProbe::default()
            });

        let asset = MediaAsset {
            kind,
            original_size_bytes: size,
            duration_seconds: probe.duration_seconds,
            bitrate_kbps: probe.bitrate_kbps(),
            container_path: input_path.to_path_buf(),
        };
        Ok(self.transcoder.transcode(&asset, out_dir).await?)
    }

    /// Transcribe a remote recording and score it against the reference text.
    #[tracing::instrument(skip(self, request, token), fields(audio_url = %request.audio_url))]
    pub async fn analyze_recitation(
        &self,
        request: AnalysisRequest,
        token: CancellationToken,
    ) -> Result<AnalysisResult, PipelineError> {
        let mut run = PipelineRun::new();
        let result = self.run_analysis(&mut run, &request, &token).await;
        Self::finish(&mut run, &result);
        result
    }

    async fn run_analysis(
        &self,
        run: &mut PipelineRun,
        request: &AnalysisRequest,
        token: &CancellationToken,
    ) -> Result<AnalysisResult, PipelineError> {
        let stages = &self.settings.stages;
        let backoff = stages.retry_backoff;
        let budget = Budget::new(stages.analysis_timeout);
        let mut timings = Vec::new();

        run.advance(Stage::Validating)?;
        checkpoint(Stage::Validating, token)?;
        let started = Instant::now();
        let reference =
            ensure_reference(&request.reference_text).map_err(|source| PipelineError::Scoring {
                stage: Stage::Validating,
                source,
            })?;
        self.validator.validate_audio_url(&request.audio_url)?;
        let language = request
            .language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty());
        if let Some(language) = language {
            self.validator.validate_language(language)?;
        }
        let workspace = Workspace::allocate(&self.settings.temp_dir)
            .await
            .map_err(|source| PipelineError::Workspace {
                stage: Stage::Validating,
                source,
            })?;
        timings.push(timing(Stage::Validating, started));

        run.advance(Stage::Transcribing)?;
        let started = Instant::now();
        let stage_budget = budget.narrow(Stage::Transcribing, stages.transcription_timeout)?;

        let (fetcher, url, max_bytes) = (
            &self.caps.fetcher,
            request.audio_url.as_str(),
            self.settings.max_file_size,
        );
        let fetched = run_stage(
            Stage::Transcribing,
            &stage_budget.policy(Stage::Transcribing, backoff)?,
            token,
            move || fetcher.fetch(url, max_bytes),
        )
        .await?;

        let filename = url_filename(url);
        let head = &fetched.data[..fetched.data.len().min(SNIFF_LEN)];
        let kind =
            self.validator
                .detect_kind(fetched.content_type.as_deref(), filename, head)?;
        let recording = workspace
            .write(
                &format!("recording.{}", input_extension(filename)),
                &fetched.data,
            )
            .await
            .map_err(|source| PipelineError::Workspace {
                stage: Stage::Transcribing,
                source,
            })?;

        let prober = &self.caps.prober;
        let recording_path = recording.as_path();
        let duration_seconds = match run_stage(
            Stage::Transcribing,
            &stage_budget.single_attempt(Stage::Transcribing)?,
            token,
            move || prober.probe(recording_path),
        )
        .await
        {
            Ok(probe) => probe.duration_seconds,
            Err(e @ (PipelineError::Cancelled { .. } | PipelineError::Timeout { .. })) => {
                return Err(e)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Failed to probe recording");
                None
            }
        };

        let out_dir = workspace.path();
        let audio = match run_stage(
            Stage::Transcribing,
            &stage_budget.single_attempt(Stage::Transcribing)?,
            token,
            move || self.prepare_speech(kind, recording_path, out_dir),
        )
        .await
        {
            Ok(audio) => audio,
            Err(e @ (PipelineError::Transcode(_) | PipelineError::Workspace { .. })) => {
                tracing::warn!(error = %e, "Speech preprocessing failed, sending original recording");
                fetched.data.clone()
            }
            Err(e) => return Err(e),
        };

        let transcriber = &self.caps.transcriber;
        let transcript = run_stage(
            Stage::Transcribing,
            &stage_budget.policy(Stage::Transcribing, backoff)?,
            token,
            move || transcriber.transcribe(audio.clone(), language),
        )
        .await?;
        timings.push(timing(Stage::Transcribing, started));

        run.advance(Stage::Scoring)?;
        let started = Instant::now();
        let (reference, hypothesis, scoring) = (
            Arc::new(reference),
            Arc::new(hypothesis_words(&transcript)),
            &self.settings.scoring,
        );
        // Alignment is CPU-bound; keep it off the async workers.
        let report = run_stage(
            Stage::Scoring,
            &budget.single_attempt(Stage::Scoring)?,
            token,
            move || {
                let (reference, hypothesis, scoring) =
                    (reference.clone(), hypothesis.clone(), scoring.clone());
                async move {
                    let scored = tokio::task::spawn_blocking(move || {
                        score_words(&reference, &hypothesis, &scoring)
                    })
                    .await;
                    match scored {
                        Ok(report) => report.map_err(|source| PipelineError::Scoring {
                            stage: Stage::Scoring,
                            source,
                        }),
                        Err(e) => Err(PipelineError::Internal {
                            stage: Stage::Scoring,
                            message: e.to_string(),
                        }),
                    }
                }
            },
        )
        .await?;
        let feedback = suggestions(&report, &self.settings.scoring);
        timings.push(timing(Stage::Scoring, started));

        let mut summary = None;
        if let Some(summarizer) = self
            .caps
            .summarizer
            .as_ref()
            .filter(|_| request.include_summary != Some(false))
        {
            run.advance(Stage::Summarizing)?;
            let started = Instant::now();
            let prompt = build_summary_prompt(&request.reference_text, &transcript, &report);
            summary = self
                .summarize(summarizer, prompt, &budget, token)
                .await?;
            timings.push(timing(Stage::Summarizing, started));
        }

        release(workspace);

        Ok(AnalysisResult {
            success: true,
            media: MediaSummary {
                kind,
                size_bytes: fetched.data.len() as u64,
                duration_seconds,
            },
            score: report.breakdown,
            details: report,
            transcript,
            feedback,
            summary,
            stage_timings: timings,
            analyzed_at: Utc::now(),
        })
    }

    /// Mono 16 kHz WAV rendition of the recording for the recognizer.
    async fn prepare_speech(
        &self,
        kind: MediaKind,
        recording: &Path,
        out_dir: &Path,
    ) -> Result<Bytes, PipelineError> {
        let _permit = self
            .pool
            .acquire()
            .await
            .map_err(|e| PipelineError::Internal {
                stage: Stage::Transcribing,
                message: e.to_string(),
            })?;
        let job = EncodeJob {
            input: recording.to_path_buf(),
            output: out_dir.join("speech.wav"),
            kind,
            profile: EncodeProfile::SpeechWav,
        };
        let output = self.caps.encoder.encode(&job).await?;
        let audio = tokio::fs::read(&output.path)
            .await
            .map_err(|source| PipelineError::Workspace {
                stage: Stage::Transcribing,
                source,
            })?;
        Ok(Bytes::from(audio))
    }

    /// Summary text, or `None` when the summarizer fails or runs out of time.
    /// Only cancellation is propagated.
    async fn summarize(
        &self,
        summarizer: &Arc<dyn Summarizer>,
        prompt: String,
        budget: &Budget,
        token: &CancellationToken,
    ) -> Result<Option<String>, PipelineError> {
        let stages = &self.settings.stages;
        let policy = match budget
            .narrow(Stage::Summarizing, stages.summary_timeout)
            .and_then(|b| b.policy(Stage::Summarizing, stages.retry_backoff))
        {
            Ok(policy) => policy,
            Err(e) => {
                tracing::warn!(error = %e, "No time left for a summary");
                return Ok(None);
            }
        };

        let request = SummaryRequest::new(prompt);
        let request = &request;
        match run_stage(Stage::Summarizing, &policy, token, move || {
            summarizer.summarize(request)
        })
        .await
        {
            Ok(completion) => Ok(Some(completion.content)),
            Err(e @ PipelineError::Cancelled { .. }) => Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Summary unavailable, returning scores without it");
                Ok(None)
            }
        }
    }

    /// Direct completion against the configured language model.
    #[tracing::instrument(skip(self, request, token), fields(prompt_chars = request.prompt.len()))]
    pub async fn complete(
        &self,
        request: SummaryRequest,
        token: CancellationToken,
    ) -> Result<Completion, PipelineError> {
        let summarizer = self
            .caps
            .summarizer
            .as_ref()
            .ok_or(PipelineError::Summary(SummaryError::NotConfigured))?;
        let policy = StagePolicy::new(
            self.settings.stages.summary_timeout,
            self.settings.stages.retry_backoff,
        );
        let request = &request;
        let result = run_stage(Stage::Summarizing, &policy, &token, move || {
            summarizer.summarize(request)
        })
        .await;
        if let Err(e) = &result {
            log_failure(e);
        }
        result
    }
}
