//! Stub capabilities and a harness wiring them into an orchestrator.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use recital_core::{StorageBackend, TranscriptSegment, TranscriptionResult};
use recital_pipeline::{Capabilities, Orchestrator, PipelineSettings};
use recital_processing::{
    EncodeError, EncodeJob, EncodeOutput, EncodeProfile, Encoder, MediaProbe, MediaProber,
};
use recital_services::{
    Completion, FetchError, FetchedMedia, MediaFetcher, SummaryError, SummaryRequest, Summarizer,
    Transcriber, TranscriptionError,
};
use recital_storage::{Storage, StorageError, StorageResult};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const SPEECH_BYTES: &[u8] = b"RIFF----WAVEspeech";

/// An ID3-tagged payload that sniffs as audio.
pub fn mp3_bytes(len: usize) -> Bytes {
    let mut data = b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec();
    data.resize(len, 0x55);
    Bytes::from(data)
}

pub fn wav_bytes(len: usize) -> Bytes {
    let mut data = b"RIFF\x00\x00\x00\x00WAVEfmt ".to_vec();
    data.resize(len, 0);
    Bytes::from(data)
}

/// Transcript with one timed segment per word, 400 ms apart.
pub fn timed_transcript(text: &str) -> TranscriptionResult {
    let segments = text
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| TranscriptSegment {
            text: word.to_string(),
            start_ms: i as u64 * 400,
            end_ms: i as u64 * 400 + 350,
            confidence: Some(0.95),
        })
        .collect();
    TranscriptionResult {
        text: text.to_string(),
        language: Some("en".to_string()),
        segments,
        vtt: None,
    }
}

/// Outputs sized from the requested bitrate and a fixed duration.
pub struct StubEncoder {
    pub duration_seconds: f64,
    pub fail_speech: bool,
    /// Multiplier on bitrate-targeted output sizes.
    pub overshoot: f64,
    calls: Mutex<Vec<EncodeProfile>>,
}

impl StubEncoder {
    pub fn new(duration_seconds: f64) -> Self {
        Self {
            duration_seconds,
            fail_speech: false,
            overshoot: 1.0,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every bitrate-targeted output comes out `factor` times too large.
    pub fn overshooting(duration_seconds: f64, factor: f64) -> Self {
        Self {
            overshoot: factor,
            ..Self::new(duration_seconds)
        }
    }

    pub fn failing_speech(duration_seconds: f64) -> Self {
        Self {
            fail_speech: true,
            ..Self::new(duration_seconds)
        }
    }

    pub fn calls(&self) -> Vec<EncodeProfile> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Encoder for StubEncoder {
    async fn encode(&self, job: &EncodeJob) -> Result<EncodeOutput, EncodeError> {
        self.calls.lock().unwrap().push(job.profile);
        match job.profile {
            EncodeProfile::SpeechWav if self.fail_speech => Err(EncodeError::Failed {
                program: "ffmpeg".into(),
                stderr: "Invalid data found when processing input".into(),
            }),
            EncodeProfile::SpeechWav => {
                std::fs::write(&job.output, SPEECH_BYTES)?;
                Ok(EncodeOutput {
                    path: job.output.clone(),
                    size_bytes: SPEECH_BYTES.len() as u64,
                })
            }
            EncodeProfile::TargetBitrate { kbps } => {
                let size =
                    (kbps as f64 * 1000.0 * self.duration_seconds / 8.0 * self.overshoot) as u64;
                std::fs::File::create(&job.output)?.set_len(size)?;
                Ok(EncodeOutput {
                    path: job.output.clone(),
                    size_bytes: size,
                })
            }
            EncodeProfile::Normalize => {
                std::fs::File::create(&job.output)?.set_len(1024)?;
                Ok(EncodeOutput {
                    path: job.output.clone(),
                    size_bytes: 1024,
                })
            }
        }
    }
}

pub struct StubProber {
    pub duration_seconds: Option<f64>,
}

#[async_trait]
impl MediaProber for StubProber {
    async fn probe(&self, _path: &Path) -> Result<MediaProbe, EncodeError> {
        match self.duration_seconds {
            Some(duration) => Ok(MediaProbe {
                duration_seconds: Some(duration),
                bitrate_bps: None,
            }),
            None => Err(EncodeError::InvalidProbe("no streams".into())),
        }
    }
}

/// In-memory storage that can fail its first uploads.
#[derive(Default)]
pub struct MemoryStorage {
    transient_failures: AtomicU32,
    permanent_failure: bool,
    calls: AtomicU32,
    objects: Mutex<Vec<(String, usize, String)>>,
}

impl MemoryStorage {
    pub fn failing_first(count: u32) -> Self {
        Self {
            transient_failures: AtomicU32::new(count),
            ..Default::default()
        }
    }

    pub fn rejecting() -> Self {
        Self {
            permanent_failure: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Stored `(key, size, content_type)` triples.
    pub fn objects(&self) -> Vec<(String, usize, String)> {
        self.objects.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn store(
        &self,
        storage_key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.permanent_failure {
            return Err(StorageError::ConfigError("bucket missing".into()));
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::BackendError("503 Slow Down".into()));
        }
        self.objects.lock().unwrap().push((
            storage_key.to_string(),
            data.len(),
            content_type.to_string(),
        ));
        Ok(format!("https://media.example.com/{}", storage_key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

pub struct ScriptedTranscriber {
    transcript: TranscriptionResult,
    transient_failures: AtomicU32,
    permanent_failure: bool,
    delay: Duration,
    calls: AtomicU32,
    received: Mutex<Vec<Bytes>>,
}

impl ScriptedTranscriber {
    pub fn new(transcript: TranscriptionResult) -> Self {
        Self {
            transcript,
            transient_failures: AtomicU32::new(0),
            permanent_failure: false,
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_first(mut self, count: u32) -> Self {
        self.transient_failures = AtomicU32::new(count);
        self
    }

    pub fn rejecting(mut self) -> Self {
        self.permanent_failure = true;
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<Bytes> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(
        &self,
        audio: Bytes,
        _language: Option<&str>,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.received.lock().unwrap().push(audio);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.permanent_failure {
            return Err(TranscriptionError::Status {
                status: 400,
                body: "unsupported audio".into(),
            });
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(TranscriptionError::Network("connection reset".into()));
        }
        Ok(self.transcript.clone())
    }
}

pub struct StubFetcher {
    media: FetchedMedia,
    calls: AtomicU32,
}

impl StubFetcher {
    pub fn new(data: Bytes, content_type: &str) -> Self {
        Self {
            media: FetchedMedia {
                data,
                content_type: Some(content_type.to_string()),
            },
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaFetcher for StubFetcher {
    async fn fetch(&self, _url: &str, max_bytes: u64) -> Result<FetchedMedia, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.media.data.len() as u64 > max_bytes {
            return Err(FetchError::TooLarge { max: max_bytes });
        }
        Ok(self.media.clone())
    }
}

pub struct StubSummarizer {
    reply: Option<String>,
    calls: AtomicU32,
}

impl StubSummarizer {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for StubSummarizer {
    async fn summarize(&self, _request: &SummaryRequest) -> Result<Completion, SummaryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Some(text) => Ok(Completion {
                content: text.clone(),
                model: Some("stub".into()),
            }),
            None => Err(SummaryError::Status {
                status: 500,
                body: "upstream overloaded".into(),
            }),
        }
    }
}

/// Stub capabilities plus settings pointing at a private temp directory.
pub struct Harness {
    pub encoder: Arc<StubEncoder>,
    pub prober: Arc<StubProber>,
    pub storage: Arc<MemoryStorage>,
    pub transcriber: Arc<ScriptedTranscriber>,
    pub fetcher: Arc<StubFetcher>,
    pub summarizer: Option<Arc<StubSummarizer>>,
    pub settings: PipelineSettings,
    temp: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let mut settings = PipelineSettings::default();
        settings.temp_dir = temp.path().join("work");
        settings.stages.retry_backoff = Duration::from_millis(1);
        settings.transcode.max_concurrent = 2;

        Self {
            encoder: Arc::new(StubEncoder::new(10.0)),
            prober: Arc::new(StubProber {
                duration_seconds: Some(10.0),
            }),
            storage: Arc::new(MemoryStorage::default()),
            transcriber: Arc::new(ScriptedTranscriber::new(timed_transcript(
                "the quick brown fox jumps over the lazy dog",
            ))),
            fetcher: Arc::new(StubFetcher::new(wav_bytes(4096), "audio/wav")),
            summarizer: Some(Arc::new(StubSummarizer::replying("Well done."))),
            settings,
            temp,
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        let caps = Capabilities {
            storage: self.storage.clone(),
            transcriber: self.transcriber.clone(),
            summarizer: self
                .summarizer
                .clone()
                .map(|s| s as Arc<dyn Summarizer>),
            fetcher: self.fetcher.clone(),
            encoder: self.encoder.clone(),
            prober: self.prober.clone(),
        };
        Orchestrator::new(caps, self.settings.clone())
    }

    /// Request workspaces still present on disk.
    pub fn leftover_workspaces(&self) -> usize {
        match std::fs::read_dir(&self.settings.temp_dir) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}
