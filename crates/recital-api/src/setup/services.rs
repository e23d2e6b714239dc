//! Capability wiring

use anyhow::Context;
use recital_core::Config;
use recital_pipeline::Capabilities;
use recital_processing::{FfmpegEncoder, FfprobeProber};
use recital_services::{
    ChatCompletionClient, CloudflareWhisper, DisabledTranscriber, HttpMediaFetcher, Summarizer,
    Transcriber,
};
use std::sync::Arc;

/// Build the external capabilities the orchestrator drives.
///
/// Speech recognition and the language model are optional: without
/// credentials the service still starts, analysis answers 503 and summaries
/// are skipped.
pub async fn build_capabilities(config: &Config) -> anyhow::Result<Capabilities> {
    let storage = recital_storage::create_storage(config.storage())
        .await
        .context("Failed to initialize storage backend")?;

    let stages = config.pipeline();

    let transcriber: Arc<dyn Transcriber> = if config.asr().is_configured() {
        Arc::new(
            CloudflareWhisper::new(config.asr(), stages.transcription_timeout)
                .context("Failed to build speech recognition client")?,
        )
    } else {
        tracing::warn!("ASR credentials missing; analysis requests will be rejected");
        Arc::new(DisabledTranscriber)
    };

    let summarizer: Option<Arc<dyn Summarizer>> = if config.llm().is_configured() {
        let client = ChatCompletionClient::new(config.llm())
            .context("Failed to build language model client")?;
        Some(Arc::new(client))
    } else {
        tracing::info!("LLM_API_KEY not set; summaries are disabled");
        None
    };

    let fetcher = HttpMediaFetcher::new(stages.analysis_timeout)
        .context("Failed to build media download client")?;

    let transcode = config.transcode();
    tracing::info!(
        storage_backend = %storage.backend_type(),
        asr_configured = config.asr().is_configured(),
        llm_configured = summarizer.is_some(),
        ffmpeg_path = %transcode.ffmpeg_path,
        max_concurrent_transcodes = transcode.max_concurrent,
        "Capabilities initialized"
    );

    Ok(Capabilities {
        storage,
        transcriber,
        summarizer,
        fetcher: Arc::new(fetcher),
        encoder: Arc::new(FfmpegEncoder::new(transcode.ffmpeg_path.clone())),
        prober: Arc::new(FfprobeProber::new(transcode.ffprobe_path.clone())),
    })
}
