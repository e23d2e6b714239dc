//! Configuration module
//!
//! Settings are read once at startup into [`Config`] and passed explicitly to
//! the transcoder, the scoring engine, the capability clients and the
//! orchestrator. Nothing reads the environment after startup.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::models::{MediaKind, ScoringWeights};
use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 3000;
const HTTP_CONCURRENCY_LIMIT: usize = 1024;
const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;
const TARGET_FILE_SIZE: u64 = 10 * 1024 * 1024;
const TEMP_DIR: &str = "/tmp/media_processing";
const TRANSCODE_MAX_ATTEMPTS: u32 = 4;
const TRANSCODE_SHRINK_FACTOR: f64 = 0.8;
const AUDIO_MIN_KBPS: u32 = 64;
const AUDIO_MAX_KBPS: u32 = 320;
const VIDEO_MIN_KBPS: u32 = 500;
const VIDEO_MAX_KBPS: u32 = 2000;
const MIN_WORD_SIMILARITY: f64 = 0.7;
const SUBSTITUTION_PENALTY: f64 = 0.5;
const IDEAL_WPM_MIN: f64 = 120.0;
const IDEAL_WPM_MAX: f64 = 180.0;
const LONG_PAUSE_SECONDS: f64 = 1.0;
const ANALYSIS_TIMEOUT_SECS: u64 = 60;
const TRANSCODE_TIMEOUT_SECS: u64 = 300;
const STAGE_TIMEOUT_SECS: u64 = 60;
const STAGE_RETRY_BACKOFF_MS: u64 = 500;
const ASR_BASE_URL: &str = "https://api.cloudflare.com/client/v4/accounts";
const ASR_MODEL: &str = "@cf/openai/whisper";
const LLM_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";
const LLM_MODEL: &str = "glm-4-flash";
const LLM_MAX_TOKENS: u32 = 4096;
const LLM_TEMPERATURE: f32 = 0.7;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Inconsistent(String),
}

/// String whose value never appears in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub service_name: String,
    pub http_concurrency_limit: usize,
}

/// Upload ceiling and workspace root.
#[derive(Clone, Debug)]
pub struct MediaConfig {
    pub max_file_size: u64,
    pub temp_dir: PathBuf,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            temp_dir: PathBuf::from(TEMP_DIR),
        }
    }
}

/// Knobs of the adaptive size-targeting transcoder.
#[derive(Clone, Debug)]
pub struct TranscodeConfig {
    pub target_file_size: u64,
    pub max_attempts: u32,
    /// Multiplier applied to the candidate bitrate after an oversize attempt, in (0,1).
    pub shrink_factor: f64,
    /// Accepted relative overshoot of the target size.
    pub size_tolerance: f64,
    pub audio_min_kbps: u32,
    pub audio_max_kbps: u32,
    pub video_min_kbps: u32,
    pub video_max_kbps: u32,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub max_concurrent: usize,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            target_file_size: TARGET_FILE_SIZE,
            max_attempts: TRANSCODE_MAX_ATTEMPTS,
            shrink_factor: TRANSCODE_SHRINK_FACTOR,
            size_tolerance: 0.0,
            audio_min_kbps: AUDIO_MIN_KBPS,
            audio_max_kbps: AUDIO_MAX_KBPS,
            video_min_kbps: VIDEO_MIN_KBPS,
            video_max_kbps: VIDEO_MAX_KBPS,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            max_concurrent: default_concurrency(),
        }
    }
}

impl TranscodeConfig {
    /// Bitrate floor and ceiling in kbps for a media kind.
    pub fn bitrate_bounds(&self, kind: MediaKind) -> (u32, u32) {
        match kind {
            MediaKind::Audio => (self.audio_min_kbps, self.audio_max_kbps),
            MediaKind::Video => (self.video_min_kbps, self.video_max_kbps),
        }
    }

    /// Largest output size accepted as meeting the target.
    pub fn accepted_size(&self) -> u64 {
        (self.target_file_size as f64 * (1.0 + self.size_tolerance)).floor() as u64
    }
}

/// Parameters of the alignment and scoring engine.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    pub min_word_similarity: f64,
    /// Share of a substituted word's confidence removed in the pronunciation score.
    pub substitution_penalty: f64,
    pub ideal_wpm_min: f64,
    pub ideal_wpm_max: f64,
    pub long_pause_seconds: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            min_word_similarity: MIN_WORD_SIMILARITY,
            substitution_penalty: SUBSTITUTION_PENALTY,
            ideal_wpm_min: IDEAL_WPM_MIN,
            ideal_wpm_max: IDEAL_WPM_MAX,
            long_pause_seconds: LONG_PAUSE_SECONDS,
        }
    }
}

/// Stage budgets and retry backoff for the orchestrator.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub analysis_timeout: Duration,
    pub transcode_timeout: Duration,
    pub upload_timeout: Duration,
    pub transcription_timeout: Duration,
    pub summary_timeout: Duration,
    pub retry_backoff: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            analysis_timeout: Duration::from_secs(ANALYSIS_TIMEOUT_SECS),
            transcode_timeout: Duration::from_secs(TRANSCODE_TIMEOUT_SECS),
            upload_timeout: Duration::from_secs(STAGE_TIMEOUT_SECS),
            transcription_timeout: Duration::from_secs(STAGE_TIMEOUT_SECS),
            summary_timeout: Duration::from_secs(STAGE_TIMEOUT_SECS),
            retry_backoff: Duration::from_millis(STAGE_RETRY_BACKOFF_MS),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_path: PathBuf,
    pub local_base_url: String,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub s3_public_base_url: Option<String>,
}

/// Cloudflare Workers AI speech recognition.
#[derive(Clone, Debug)]
pub struct AsrConfig {
    pub account_id: Option<String>,
    pub api_token: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub default_language: String,
}

impl AsrConfig {
    pub fn is_configured(&self) -> bool {
        self.account_id.is_some() && self.api_token.is_some()
    }
}

/// OpenAI-compatible chat completion endpoint used for summaries.
#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl LlmConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub api_keys: Vec<SecretString>,
}

#[derive(Clone, Debug)]
pub struct RecitalConfig {
    pub server: ServerConfig,
    pub media: MediaConfig,
    pub transcode: TranscodeConfig,
    pub scoring: ScoringConfig,
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
    pub asr: AsrConfig,
    pub llm: LlmConfig,
    pub auth: AuthConfig,
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .max(1)
}

/// Typed access to a key/value source such as the process environment.
struct Settings<F> {
    lookup: F,
}

impl<F> Settings<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn first(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get(key))
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value }),
            None => Ok(default),
        }
    }

    fn bool_or(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            Some(value) => match value.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid { key, value }),
            },
            None => Ok(default),
        }
    }

    fn seconds_or(&self, key: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
        match self.get(key) {
            Some(value) => match value.parse::<f64>() {
                Ok(secs) if secs.is_finite() && secs > 0.0 => Ok(Duration::from_secs_f64(secs)),
                _ => Err(ConfigError::Invalid { key, value }),
            },
            None => Ok(Duration::from_secs(default_secs)),
        }
    }

    fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl RecitalConfig {
    /// Build the configuration from an arbitrary key lookup and validate it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let s = Settings { lookup };

        let cors_origins = {
            let origins = s.list("CORS_ORIGINS");
            if origins.is_empty() {
                vec!["*".to_string()]
            } else {
                origins
            }
        };

        let server = ServerConfig {
            port: match s.first(&["SERVER_PORT", "PORT"]) {
                Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                    key: "SERVER_PORT",
                    value,
                })?,
                None => SERVER_PORT,
            },
            environment: s
                .first(&["ENVIRONMENT", "APP_ENV"])
                .unwrap_or_else(|| "development".to_string()),
            cors_origins,
            service_name: s.string_or("SERVICE_NAME", "recital"),
            http_concurrency_limit: s
                .parse_or("HTTP_CONCURRENCY_LIMIT", HTTP_CONCURRENCY_LIMIT)?
                .max(1),
        };

        let media = MediaConfig {
            max_file_size: s.parse_or("MAX_FILE_SIZE", MAX_FILE_SIZE)?,
            temp_dir: PathBuf::from(s.string_or("TEMP_DIR", TEMP_DIR)),
        };

        let defaults = TranscodeConfig::default();
        let transcode = TranscodeConfig {
            target_file_size: s.parse_or("TARGET_FILE_SIZE", TARGET_FILE_SIZE)?,
            max_attempts: s.parse_or("TRANSCODE_MAX_ATTEMPTS", TRANSCODE_MAX_ATTEMPTS)?,
            shrink_factor: s.parse_or("TRANSCODE_SHRINK_FACTOR", TRANSCODE_SHRINK_FACTOR)?,
            size_tolerance: s.parse_or("TRANSCODE_SIZE_TOLERANCE", 0.0)?,
            ffmpeg_path: s.string_or("FFMPEG_PATH", "ffmpeg"),
            ffprobe_path: s.string_or("FFPROBE_PATH", "ffprobe"),
            max_concurrent: s.parse_or("MAX_CONCURRENT_TRANSCODES", defaults.max_concurrent)?,
            ..defaults
        };

        let scoring = ScoringConfig {
            weights: ScoringWeights {
                accuracy: s.parse_or("ACCURACY_WEIGHT", 0.3)?,
                fluency: s.parse_or("FLUENCY_WEIGHT", 0.3)?,
                pronunciation: s.parse_or("PRONUNCIATION_ACCURACY_WEIGHT", 0.4)?,
            },
            min_word_similarity: s.parse_or("MIN_WORD_SIMILARITY", MIN_WORD_SIMILARITY)?,
            substitution_penalty: s.parse_or("SUBSTITUTION_PENALTY", SUBSTITUTION_PENALTY)?,
            ideal_wpm_min: s.parse_or("IDEAL_WPM_MIN", IDEAL_WPM_MIN)?,
            ideal_wpm_max: s.parse_or("IDEAL_WPM_MAX", IDEAL_WPM_MAX)?,
            long_pause_seconds: s.parse_or("LONG_PAUSE_SECONDS", LONG_PAUSE_SECONDS)?,
        };

        let pipeline = PipelineConfig {
            analysis_timeout: s.seconds_or("ANALYSIS_TIMEOUT", ANALYSIS_TIMEOUT_SECS)?,
            transcode_timeout: s.seconds_or("TRANSCODE_TIMEOUT", TRANSCODE_TIMEOUT_SECS)?,
            upload_timeout: s.seconds_or("UPLOAD_TIMEOUT", STAGE_TIMEOUT_SECS)?,
            transcription_timeout: s.seconds_or("TRANSCRIPTION_TIMEOUT", STAGE_TIMEOUT_SECS)?,
            summary_timeout: s.seconds_or("SUMMARY_TIMEOUT", STAGE_TIMEOUT_SECS)?,
            retry_backoff: Duration::from_millis(
                s.parse_or("STAGE_RETRY_BACKOFF_MS", STAGE_RETRY_BACKOFF_MS)?,
            ),
        };

        let backend = match s.get("STORAGE_BACKEND") {
            Some(value) => value
                .parse::<StorageBackend>()
                .map_err(|_| ConfigError::Invalid {
                    key: "STORAGE_BACKEND",
                    value,
                })?,
            None => StorageBackend::Local,
        };
        let storage = StorageConfig {
            backend,
            local_path: PathBuf::from(s.string_or("LOCAL_STORAGE_PATH", "./storage")),
            local_base_url: s.string_or("LOCAL_STORAGE_BASE_URL", "http://localhost:3000/media"),
            s3_bucket: s.string_or("S3_BUCKET", "polly_memo"),
            s3_region: s.string_or("S3_REGION", "us-east-1"),
            s3_endpoint: s.get("S3_ENDPOINT"),
            s3_public_base_url: s.get("S3_PUBLIC_BASE_URL"),
        };

        let asr = AsrConfig {
            account_id: s.get("CLOUDFLARE_ACCOUNT_ID"),
            api_token: s.get("CLOUDFLARE_API_TOKEN").map(SecretString::new),
            base_url: s.string_or("ASR_BASE_URL", ASR_BASE_URL),
            model: s.string_or("ASR_MODEL", ASR_MODEL),
            default_language: s.string_or("ASR_DEFAULT_LANGUAGE", "zh"),
        };

        let llm = LlmConfig {
            api_key: s
                .first(&["LLM_API_KEY", "GLM4_API_KEY"])
                .map(SecretString::new),
            base_url: s
                .first(&["LLM_BASE_URL", "GLM4_BASE_URL"])
                .unwrap_or_else(|| LLM_BASE_URL.to_string()),
            model: s
                .first(&["LLM_MODEL", "GLM4_MODEL"])
                .unwrap_or_else(|| LLM_MODEL.to_string()),
            timeout: s.seconds_or("LLM_TIMEOUT", STAGE_TIMEOUT_SECS)?,
            max_tokens: s.parse_or("LLM_MAX_TOKENS", LLM_MAX_TOKENS)?,
            temperature: s.parse_or("LLM_TEMPERATURE", LLM_TEMPERATURE)?,
        };

        let mut api_keys: Vec<SecretString> = s
            .list("API_KEYS")
            .into_iter()
            .map(SecretString::new)
            .collect();
        if let Some(key) = s.get("API_KEY") {
            api_keys.push(SecretString::new(key));
        }
        let auth = AuthConfig {
            enabled: s.bool_or("ENABLE_API_KEY_AUTH", false)?,
            api_keys,
        };

        let config = RecitalConfig {
            server,
            media,
            transcode,
            scoring,
            pipeline,
            storage,
            asr,
            llm,
            auth,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::Inconsistent(msg));

        if self.is_production() && self.server.cors_origins.iter().any(|o| o == "*") {
            return fail(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
                    .to_string(),
            );
        }
        if self.media.max_file_size == 0 || self.transcode.target_file_size == 0 {
            return fail("MAX_FILE_SIZE and TARGET_FILE_SIZE must be positive".to_string());
        }
        if self.transcode.target_file_size > self.media.max_file_size {
            return fail(format!(
                "TARGET_FILE_SIZE ({}) must not exceed MAX_FILE_SIZE ({})",
                self.transcode.target_file_size, self.media.max_file_size
            ));
        }
        if !(self.transcode.shrink_factor > 0.0 && self.transcode.shrink_factor < 1.0) {
            return fail(format!(
                "TRANSCODE_SHRINK_FACTOR must be in (0,1), got {}",
                self.transcode.shrink_factor
            ));
        }
        if self.transcode.max_attempts == 0 {
            return fail("TRANSCODE_MAX_ATTEMPTS must be at least 1".to_string());
        }
        if !self.transcode.size_tolerance.is_finite() || self.transcode.size_tolerance < 0.0 {
            return fail("TRANSCODE_SIZE_TOLERANCE must be non-negative".to_string());
        }
        if self.transcode.max_concurrent == 0 {
            return fail("MAX_CONCURRENT_TRANSCODES must be at least 1".to_string());
        }
        self.scoring.weights.validate().map_err(ConfigError::Inconsistent)?;
        let sim = self.scoring.min_word_similarity;
        if !(sim > 0.0 && sim <= 1.0) {
            return fail(format!("MIN_WORD_SIMILARITY must be in (0,1], got {}", sim));
        }
        if !(0.0..=1.0).contains(&self.scoring.substitution_penalty) {
            return fail("SUBSTITUTION_PENALTY must be in [0,1]".to_string());
        }
        if !(self.scoring.ideal_wpm_min > 0.0
            && self.scoring.ideal_wpm_min < self.scoring.ideal_wpm_max)
        {
            return fail("IDEAL_WPM_MIN must be positive and below IDEAL_WPM_MAX".to_string());
        }
        if !(self.scoring.long_pause_seconds > 0.0) {
            return fail("LONG_PAUSE_SECONDS must be positive".to_string());
        }
        if self.storage.backend == StorageBackend::S3 && self.storage.s3_bucket.is_empty() {
            return fail("S3_BUCKET is required when STORAGE_BACKEND=s3".to_string());
        }
        if self.auth.enabled && self.auth.api_keys.is_empty() {
            return fail(
                "ENABLE_API_KEY_AUTH=true requires API_KEY or API_KEYS to be set".to_string(),
            );
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        matches!(
            self.server.environment.to_lowercase().as_str(),
            "production" | "prod"
        )
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<RecitalConfig>);

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Config(Box::new(RecitalConfig::from_lookup(lookup)?)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.0.validate()
    }

    pub fn is_production(&self) -> bool {
        self.0.is_production()
    }

    pub fn server(&self) -> &ServerConfig {
        &self.0.server
    }

    pub fn media(&self) -> &MediaConfig {
        &self.0.media
    }

    pub fn transcode(&self) -> &TranscodeConfig {
        &self.0.transcode
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.0.scoring
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.0.pipeline
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.0.storage
    }

    pub fn asr(&self) -> &AsrConfig {
        &self.0.asr
    }

    pub fn llm(&self) -> &LlmConfig {
        &self.0.llm
    }

    pub fn auth(&self) -> &AuthConfig {
        &self.0.auth
    }

    // Convenience getters for common fields
    pub fn server_port(&self) -> u16 {
        self.0.server.port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.0.server.cors_origins
    }

    pub fn max_file_size(&self) -> u64 {
        self.0.media.max_file_size
    }

    pub fn target_file_size(&self) -> u64 {
        self.0.transcode.target_file_size
    }

    pub fn temp_dir(&self) -> &std::path::Path {
        &self.0.media.temp_dir
    }
}
