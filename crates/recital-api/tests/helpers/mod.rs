//! Test server wired to stub capabilities.

#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use bytes::Bytes;
use recital_core::{Config, StorageBackend, TranscriptSegment, TranscriptionResult};
use recital_pipeline::Capabilities;
use recital_processing::{
    EncodeError, EncodeJob, EncodeOutput, EncodeProfile, Encoder, MediaProbe, MediaProber,
};
use recital_services::{
    Completion, DisabledTranscriber, FetchError, FetchedMedia, MediaFetcher, SummaryError,
    SummaryRequest, Summarizer, Transcriber, TranscriptionError,
};
use recital_storage::{Storage, StorageResult};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const API_KEY: &str = "test-key";

pub const REFERENCE: &str = "the quick brown fox jumps over the lazy dog";

pub fn mp3_bytes(len: usize) -> Vec<u8> {
    let mut data = b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec();
    data.resize(len, 0x55);
    data
}

pub fn transcript(text: &str) -> TranscriptionResult {
    let segments = text
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| TranscriptSegment {
            text: word.to_string(),
            start_ms: i as u64 * 400,
            end_ms: i as u64 * 400 + 350,
            confidence: Some(0.9),
        })
        .collect();
    TranscriptionResult {
        text: text.to_string(),
        language: Some("en".to_string()),
        segments,
        vtt: None,
    }
}

/// Writes a small file for every profile.
pub struct StubEncoder;

#[async_trait]
impl Encoder for StubEncoder {
    async fn encode(&self, job: &EncodeJob) -> Result<EncodeOutput, EncodeError> {
        let size = match job.profile {
            EncodeProfile::SpeechWav => 64,
            EncodeProfile::Normalize => 512,
            EncodeProfile::TargetBitrate { kbps } => u64::from(kbps) * 100,
        };
        std::fs::File::create(&job.output)?.set_len(size)?;
        Ok(EncodeOutput {
            path: job.output.clone(),
            size_bytes: size,
        })
    }
}

pub struct StubProber;

#[async_trait]
impl MediaProber for StubProber {
    async fn probe(&self, _path: &Path) -> Result<MediaProbe, EncodeError> {
        Ok(MediaProbe {
            duration_seconds: Some(5.0),
            bitrate_bps: None,
        })
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<Vec<String>>,
}

impl MemoryStorage {
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn store(
        &self,
        storage_key: &str,
        _data: Bytes,
        _content_type: &str,
    ) -> StorageResult<String> {
        self.objects.lock().unwrap().push(storage_key.to_string());
        Ok(format!("https://media.example.com/{}", storage_key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

pub struct FixedTranscriber(pub TranscriptionResult);

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(
        &self,
        _audio: Bytes,
        _language: Option<&str>,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        Ok(self.0.clone())
    }
}

pub struct StubFetcher {
    calls: AtomicU32,
}

impl StubFetcher {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaFetcher for StubFetcher {
    async fn fetch(&self, _url: &str, _max_bytes: u64) -> Result<FetchedMedia, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FetchedMedia {
            data: Bytes::from(mp3_bytes(2048)),
            content_type: Some("audio/mpeg".to_string()),
        })
    }
}

pub struct EchoSummarizer;

#[async_trait]
impl Summarizer for EchoSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> Result<Completion, SummaryError> {
        Ok(Completion {
            content: format!("echo: {}", request.prompt.lines().next().unwrap_or_default()),
            model: Some("stub-model".to_string()),
        })
    }
}

/// Which optional capabilities the test app gets.
pub struct AppOptions {
    pub asr: bool,
    pub llm: bool,
    pub auth: bool,
    pub env: Vec<(&'static str, String)>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            asr: true,
            llm: true,
            auth: true,
            env: Vec::new(),
        }
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub storage: Arc<MemoryStorage>,
    pub fetcher: Arc<StubFetcher>,
    _temp: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub fn bearer() -> String {
    format!("Bearer {}", API_KEY)
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with(AppOptions::default())
}

pub fn setup_test_app_with(options: AppOptions) -> TestApp {
    let temp = TempDir::new().expect("Failed to create temp dir");

    let mut env: HashMap<String, String> = [
        ("ENVIRONMENT", "test".to_string()),
        ("STORAGE_BACKEND", "local".to_string()),
        (
            "LOCAL_STORAGE_PATH",
            temp.path().join("storage").display().to_string(),
        ),
        ("TEMP_DIR", temp.path().join("work").display().to_string()),
        ("MAX_FILE_SIZE", "65536".to_string()),
        ("TARGET_FILE_SIZE", "8192".to_string()),
        ("STAGE_RETRY_BACKOFF_MS", "1".to_string()),
        ("ENABLE_API_KEY_AUTH", options.auth.to_string()),
        ("API_KEYS", format!("{},second-key", API_KEY)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    for (key, value) in options.env {
        env.insert(key.to_string(), value);
    }
    let config = Config::from_lookup(|key| env.get(key).cloned()).expect("Invalid test config");

    let storage = Arc::new(MemoryStorage::default());
    let fetcher = Arc::new(StubFetcher {
        calls: AtomicU32::new(0),
    });
    let transcriber: Arc<dyn Transcriber> = if options.asr {
        Arc::new(FixedTranscriber(transcript("the quick brown fox jumps over the dog")))
    } else {
        Arc::new(DisabledTranscriber)
    };
    let summarizer: Option<Arc<dyn Summarizer>> = if options.llm {
        Some(Arc::new(EchoSummarizer))
    } else {
        None
    };

    let caps = Capabilities {
        storage: storage.clone(),
        transcriber,
        summarizer,
        fetcher: fetcher.clone(),
        encoder: Arc::new(StubEncoder),
        prober: Arc::new(StubProber),
    };

    let (_state, app) =
        recital_api::setup::build_app(config, caps).expect("Failed to build test app");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        storage,
        fetcher,
        _temp: temp,
    }
}
