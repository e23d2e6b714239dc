mod helpers;

use helpers::*;
use recital_core::{AnalysisRequest, ErrorMetadata, MediaKind};
use recital_pipeline::{CancellationToken, PipelineError, Stage, UploadInput};
use recital_processing::{EncodeProfile, TranscodeError};
use recital_services::SummaryRequest;
use std::sync::Arc;
use std::time::{Duration, Instant};

const REFERENCE: &str = "The quick brown fox jumps over the lazy dog.";
const AUDIO_URL: &str = "https://cdn.example.com/takes/take.wav?sig=abc";

fn upload(filename: &str, content_type: &str, data: bytes::Bytes) -> UploadInput {
    UploadInput {
        filename: Some(filename.to_string()),
        content_type: Some(content_type.to_string()),
        data,
    }
}

fn analysis(reference: &str) -> AnalysisRequest {
    AnalysisRequest {
        reference_text: reference.to_string(),
        audio_url: AUDIO_URL.to_string(),
        language: Some("en".to_string()),
        include_summary: None,
    }
}

#[tokio::test]
async fn test_small_canonical_upload_is_stored_as_is() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator();

    let result = orchestrator
        .process_media(
            upload("take.mp3", "audio/mpeg", mp3_bytes(2000)),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.file_type, MediaKind::Audio);
    assert_eq!(result.original_size, 2000);
    assert_eq!(result.processed_size, 2000);
    assert_eq!(result.compression_ratio, 1.0);
    assert_eq!(result.message, "File uploaded directly");
    assert!(harness.encoder.calls().is_empty());

    let objects = harness.storage.objects();
    assert_eq!(objects.len(), 1);
    let (key, size, content_type) = &objects[0];
    assert!(key.starts_with("audio/") && key.ends_with(".mp3"), "{key}");
    assert_eq!(*size, 2000);
    assert_eq!(content_type, "audio/mpeg");
    assert!(result.file_url.ends_with(key.as_str()));
    assert_eq!(harness.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_small_foreign_container_is_normalized() {
    let harness = Harness::new();
    let result = harness
        .orchestrator()
        .process_media(
            upload("take.wav", "audio/wav", wav_bytes(2000)),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(harness.encoder.calls(), vec![EncodeProfile::Normalize]);
    assert_eq!(result.processed_size, 1024);
    assert_eq!(result.message, "File converted successfully");
    assert!(harness.storage.objects()[0].0.ends_with(".mp3"));
}

#[tokio::test]
async fn test_oversize_upload_is_compressed_to_target() {
    let mut harness = Harness::new();
    harness.settings.transcode.target_file_size = 4000;
    harness.settings.transcode.audio_min_kbps = 1;

    let result = harness
        .orchestrator()
        .process_media(
            upload("lecture.mp3", "audio/mpeg", mp3_bytes(40_000)),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    // 4000 bytes over 10 s is 3.2 kbps, floored to 3.
    assert_eq!(
        harness.encoder.calls(),
        vec![EncodeProfile::TargetBitrate { kbps: 3 }]
    );
    assert_eq!(result.processed_size, 3750);
    assert!(result.processed_size <= 4000);
    assert!(result.compression_ratio < 1.0);
    assert_eq!(result.message, "File compressed successfully");
    assert_eq!(harness.storage.objects()[0].1, 3750);
}

#[tokio::test]
async fn test_compression_that_never_fits_fails_without_upload() {
    let mut harness = Harness::new();
    harness.settings.transcode.target_file_size = 4000;
    harness.settings.transcode.audio_min_kbps = 1;
    harness.encoder = Arc::new(StubEncoder::overshooting(10.0, 50.0));

    let err = harness
        .orchestrator()
        .process_media(
            upload("lecture.mp3", "audio/mpeg", mp3_bytes(40_000)),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            PipelineError::Transcode(TranscodeError::ExceededAfterMaxAttempts { .. })
        ),
        "{err}"
    );
    assert_eq!(err.stage(), Stage::Transcoding);
    assert_eq!(err.to_app_error().http_status_code(), 500);
    assert!(!harness.encoder.calls().is_empty());
    assert_eq!(harness.storage.calls(), 0);
    assert_eq!(harness.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_oversize_upload_without_duration_fails_without_upload() {
    let mut harness = Harness::new();
    harness.settings.transcode.target_file_size = 4000;
    harness.prober = Arc::new(StubProber {
        duration_seconds: None,
    });

    let err = harness
        .orchestrator()
        .process_media(
            upload("lecture.mp3", "audio/mpeg", mp3_bytes(40_000)),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(err, PipelineError::Transcode(TranscodeError::UnknownDuration)),
        "{err}"
    );
    assert!(harness.encoder.calls().is_empty());
    assert_eq!(harness.storage.calls(), 0);
    assert_eq!(harness.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_unsupported_upload_is_rejected_before_work() {
    let harness = Harness::new();
    let err = harness
        .orchestrator()
        .process_media(
            upload("notes.txt", "text/plain", bytes::Bytes::from_static(b"hello there")),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Validating);
    assert_eq!(err.to_app_error().http_status_code(), 415);
    assert!(harness.encoder.calls().is_empty());
    assert_eq!(harness.storage.calls(), 0);
}

#[tokio::test]
async fn test_transient_upload_failure_is_retried_once() {
    let mut harness = Harness::new();
    harness.storage = Arc::new(MemoryStorage::failing_first(1));

    let result = harness
        .orchestrator()
        .process_media(
            upload("take.mp3", "audio/mpeg", mp3_bytes(2000)),
            CancellationToken::new(),
        )
        .await;

    assert!(result.is_ok());
    assert_eq!(harness.storage.calls(), 2);
    assert_eq!(harness.storage.objects().len(), 1);
}

#[tokio::test]
async fn test_repeated_upload_failure_surfaces_after_one_retry() {
    let mut harness = Harness::new();
    harness.storage = Arc::new(MemoryStorage::failing_first(5));

    let err = harness
        .orchestrator()
        .process_media(
            upload("take.mp3", "audio/mpeg", mp3_bytes(2000)),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Upload(_)));
    assert_eq!(err.to_app_error().http_status_code(), 502);
    assert_eq!(harness.storage.calls(), 2);
    assert_eq!(harness.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_permanent_upload_failure_is_not_retried() {
    let mut harness = Harness::new();
    harness.storage = Arc::new(MemoryStorage::rejecting());

    let err = harness
        .orchestrator()
        .process_media(
            upload("take.mp3", "audio/mpeg", mp3_bytes(2000)),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Uploading);
    assert_eq!(harness.storage.calls(), 1);
}

#[tokio::test]
async fn test_analysis_scores_and_summarizes() {
    let harness = Harness::new();
    let result = harness
        .orchestrator()
        .analyze_recitation(analysis(REFERENCE), CancellationToken::new())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.media.kind, MediaKind::Audio);
    assert_eq!(result.media.size_bytes, 4096);
    assert_eq!(result.media.duration_seconds, Some(10.0));
    assert_eq!(result.score.accuracy, 1.0);
    assert!(result.details.missing_words.is_empty());
    assert!(!result.feedback.is_empty());
    assert_eq!(result.summary.as_deref(), Some("Well done."));

    let stages: Vec<_> = result.stage_timings.iter().map(|t| t.stage.as_str()).collect();
    assert_eq!(
        stages,
        vec!["validating", "transcribing", "scoring", "summarizing"]
    );

    // The recognizer receives the speech rendition, not the download.
    assert_eq!(harness.encoder.calls(), vec![EncodeProfile::SpeechWav]);
    assert_eq!(harness.transcriber.received()[0].as_ref(), SPEECH_BYTES);
    assert_eq!(harness.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_missing_words_lower_accuracy() {
    let mut harness = Harness::new();
    harness.transcriber = Arc::new(ScriptedTranscriber::new(timed_transcript(
        "the quick fox jumps over the dog",
    )));

    let result = harness
        .orchestrator()
        .analyze_recitation(analysis(REFERENCE), CancellationToken::new())
        .await
        .unwrap();

    assert!(result.score.accuracy < 1.0);
    assert_eq!(result.details.missing_words, vec!["brown", "lazy"]);
}

#[tokio::test]
async fn test_summary_failure_still_returns_scores() {
    let mut harness = Harness::new();
    let summarizer = Arc::new(StubSummarizer::failing());
    harness.summarizer = Some(summarizer.clone());

    let result = harness
        .orchestrator()
        .analyze_recitation(analysis(REFERENCE), CancellationToken::new())
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.summary.is_none());
    // The upstream 500 is transient and gets its single retry.
    assert_eq!(summarizer.calls(), 2);
}

#[tokio::test]
async fn test_summary_can_be_skipped() {
    let harness = Harness::new();
    let mut request = analysis(REFERENCE);
    request.include_summary = Some(false);

    let result = harness
        .orchestrator()
        .analyze_recitation(request, CancellationToken::new())
        .await
        .unwrap();

    assert!(result.summary.is_none());
    assert!(result
        .stage_timings
        .iter()
        .all(|t| t.stage != "summarizing"));
    assert_eq!(harness.summarizer.as_ref().unwrap().calls(), 0);
}

#[tokio::test]
async fn test_empty_reference_fails_before_download() {
    let harness = Harness::new();
    let err = harness
        .orchestrator()
        .analyze_recitation(analysis("  ... !? "), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Scoring {
            stage: Stage::Validating,
            ..
        }
    ));
    assert_eq!(err.to_app_error().http_status_code(), 422);
    assert_eq!(harness.fetcher.calls(), 0);
    assert_eq!(harness.transcriber.calls(), 0);
}

#[tokio::test]
async fn test_invalid_url_is_rejected() {
    let harness = Harness::new();
    let mut request = analysis(REFERENCE);
    request.audio_url = "ftp://cdn.example.com/take.wav".to_string();

    let err = harness
        .orchestrator()
        .analyze_recitation(request, CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.to_app_error().http_status_code(), 400);
    assert_eq!(harness.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_transient_transcription_failure_is_retried_once() {
    let mut harness = Harness::new();
    harness.transcriber = Arc::new(
        ScriptedTranscriber::new(timed_transcript("the quick brown fox")).failing_first(1),
    );

    let result = harness
        .orchestrator()
        .analyze_recitation(analysis(REFERENCE), CancellationToken::new())
        .await;

    assert!(result.is_ok());
    assert_eq!(harness.transcriber.calls(), 2);
}

#[tokio::test]
async fn test_rejected_transcription_is_not_retried() {
    let mut harness = Harness::new();
    harness.transcriber = Arc::new(ScriptedTranscriber::new(timed_transcript("x")).rejecting());

    let err = harness
        .orchestrator()
        .analyze_recitation(analysis(REFERENCE), CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Transcribing);
    assert_eq!(harness.transcriber.calls(), 1);
    assert_eq!(harness.summarizer.as_ref().unwrap().calls(), 0);
}

#[tokio::test]
async fn test_preprocessing_failure_falls_back_to_download() {
    let mut harness = Harness::new();
    harness.encoder = Arc::new(StubEncoder::failing_speech(10.0));

    let result = harness
        .orchestrator()
        .analyze_recitation(analysis(REFERENCE), CancellationToken::new())
        .await;

    assert!(result.is_ok());
    let received = harness.transcriber.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0], wav_bytes(4096));
}

#[tokio::test]
async fn test_transcription_timeout_is_tagged() {
    let mut harness = Harness::new();
    harness.settings.stages.transcription_timeout = Duration::from_millis(100);
    harness.transcriber = Arc::new(
        ScriptedTranscriber::new(timed_transcript("the quick brown fox"))
            .delayed(Duration::from_secs(5)),
    );

    let started = Instant::now();
    let err = harness
        .orchestrator()
        .analyze_recitation(analysis(REFERENCE), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Timeout {
            stage: Stage::Transcribing,
            ..
        }
    ));
    assert_eq!(err.to_app_error().http_status_code(), 504);
    assert_eq!(harness.transcriber.calls(), 1);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_retry_is_bounded_by_the_analysis_deadline() {
    let mut harness = Harness::new();
    harness.summarizer = None;
    harness.settings.stages.analysis_timeout = Duration::from_millis(300);
    harness.transcriber = Arc::new(
        ScriptedTranscriber::new(timed_transcript("the quick brown fox"))
            .failing_first(1)
            .delayed(Duration::from_millis(250)),
    );

    let started = Instant::now();
    let err = harness
        .orchestrator()
        .analyze_recitation(analysis(REFERENCE), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            PipelineError::Timeout {
                stage: Stage::Transcribing,
                ..
            }
        ),
        "{err}"
    );
    assert!(started.elapsed() < Duration::from_millis(450));
    assert_eq!(harness.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_oversized_alignment_is_refused() {
    let mut harness = Harness::new();
    harness.summarizer = None;
    let spoken = "word ".repeat(5_001);
    harness.transcriber = Arc::new(ScriptedTranscriber::new(timed_transcript(&spoken)));

    let reference = "word ".repeat(5_000);
    let err = harness
        .orchestrator()
        .analyze_recitation(analysis(&reference), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            PipelineError::Scoring {
                stage: Stage::Scoring,
                ..
            }
        ),
        "{err}"
    );
    assert_eq!(err.to_app_error().http_status_code(), 413);
}

#[tokio::test]
async fn test_reference_over_word_cap_is_rejected_before_download() {
    let harness = Harness::new();
    let reference = "word ".repeat(5_001);

    let err = harness
        .orchestrator()
        .analyze_recitation(analysis(&reference), CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Validating);
    assert_eq!(err.to_app_error().http_status_code(), 422);
    assert_eq!(harness.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_cancelled_request_makes_no_calls() {
    let harness = Harness::new();
    let token = CancellationToken::new();
    token.cancel();

    let err = harness
        .orchestrator()
        .analyze_recitation(analysis(REFERENCE), token)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Cancelled {
            stage: Stage::Validating
        }
    ));
    assert_eq!(harness.fetcher.calls(), 0);
    assert_eq!(harness.transcriber.calls(), 0);
}

#[tokio::test]
async fn test_cancellation_mid_transcription_stops_the_pipeline() {
    let mut harness = Harness::new();
    harness.transcriber = Arc::new(
        ScriptedTranscriber::new(timed_transcript("the quick brown fox"))
            .delayed(Duration::from_secs(5)),
    );
    let orchestrator = harness.orchestrator();

    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        })
    };

    let err = orchestrator
        .analyze_recitation(analysis(REFERENCE), token)
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(
        err,
        PipelineError::Cancelled {
            stage: Stage::Transcribing
        }
    ));
    assert_eq!(harness.transcriber.calls(), 1);
    assert_eq!(harness.summarizer.as_ref().unwrap().calls(), 0);
    assert_eq!(harness.leftover_workspaces(), 0);
}

#[tokio::test]
async fn test_completion_requires_a_language_model() {
    let mut harness = Harness::new();
    harness.summarizer = None;
    let orchestrator = harness.orchestrator();
    assert!(!orchestrator.summarizer_configured());

    let err = orchestrator
        .complete(SummaryRequest::new("Say hi"), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_app_error().http_status_code(), 503);

    harness.summarizer = Some(Arc::new(StubSummarizer::replying("hi")));
    let completion = harness
        .orchestrator()
        .complete(SummaryRequest::new("Say hi"), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(completion.content, "hi");
}
