//! Integration tests for the extraction engine with a scripted extractor
//!
//! Run with: cargo test -p ufdcore --test engine_test

mod mocks;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::StreamExt;
use mocks::{MockExtractor, MockExtractorConfig};
use pretty_assertions::assert_eq;
use ufdcore::download::options::{Attempt, CookieSource};
use ufdcore::download::{
    DeploymentMode, DownloadError, Engine, EngineSettings, ErrorKind, MediaFormat, Platform, Quality,
    RetrievalRequest, UnavailableReason,
};
use url::Url;

const TRANSIENT_STDERR: &str = "ERROR: [youtube] abc123: Failed to extract any player response";

fn scratch_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

fn engine(dir: &Path, mode: DeploymentMode, config: MockExtractorConfig) -> (Engine, Arc<MockExtractor>) {
    let mock = Arc::new(MockExtractor::new(config));
    let settings = EngineSettings::new(dir).with_deployment(mode).with_max_concurrent(2);
    (Engine::new(settings, mock.clone()), mock)
}

fn youtube_video() -> RetrievalRequest {
    RetrievalRequest::parse("https://www.youtube.com/watch?v=abc123", "youtube", "video", Some("720p")).unwrap()
}

async fn collect(delivery: ufdcore::MediaDelivery) -> Vec<u8> {
    let mut stream = delivery.stream;
    let mut bytes = Vec::new();
    while let Some(chunk) = stream.next().await {
        bytes.extend_from_slice(&chunk.unwrap());
    }
    bytes
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_file_relay_happy_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = MockExtractorConfig::fast();
    let payload = config.payload.clone();
    let (engine, mock) = engine(dir.path(), DeploymentMode::Development, config);

    let delivery = engine.retrieve(&youtube_video()).await.unwrap();
    assert_eq!(delivery.filename, "Mock Clip.mp4");
    assert_eq!(delivery.content_type, "video/mp4");
    assert_eq!(delivery.content_length, Some(payload.len() as u64));
    assert_eq!(delivery.info.duration, Some(42));
    // Slot is free before streaming starts
    assert_eq!(engine.available_slots(), 2);
    // Only the media file remains while the stream is alive
    assert_eq!(scratch_count(dir.path()), 1);

    let bytes = collect(delivery).await;
    assert_eq!(bytes, payload);
    assert_eq!(scratch_count(dir.path()), 0);
    assert_eq!(mock.inspect_calls(), 1);
    assert_eq!(mock.retrieve_calls(), 1);
}

#[tokio::test]
async fn test_probe_returns_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mock) = engine(dir.path(), DeploymentMode::Development, MockExtractorConfig::fast());
    let info = engine.probe(&youtube_video()).await.unwrap();
    assert_eq!(info.title, "Mock Clip");
    assert_eq!(info.formats.len(), 2);
    assert_eq!(mock.retrieve_calls(), 0);
    assert_eq!(scratch_count(dir.path()), 0);
}

// ============================================================================
// Admission control
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_admission_limit_is_respected() {
    let dir = tempfile::tempdir().unwrap();
    let config = MockExtractorConfig {
        delay: Duration::from_millis(150),
        ..MockExtractorConfig::default()
    };
    let (engine, mock) = engine(dir.path(), DeploymentMode::Development, config);
    let engine = Arc::new(engine);

    let request = youtube_video();
    let jobs = (0..5).map(|_| {
        let engine = Arc::clone(&engine);
        let request = request.clone();
        async move { engine.probe(&request).await }
    });
    let results = join_all(jobs).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(mock.inspect_calls(), 5);
    assert_eq!(mock.max_in_flight(), 2);
    assert_eq!(engine.available_slots(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_retrieve_beyond_capacity_waits_for_a_slot() {
    let dir = tempfile::tempdir().unwrap();
    let config = MockExtractorConfig {
        delay: Duration::from_millis(500),
        ..MockExtractorConfig::default()
    };
    let (engine, mock) = engine(dir.path(), DeploymentMode::Development, config);
    let engine = Arc::new(engine);

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.retrieve(&youtube_video()).await })
        })
        .collect();

    // Two jobs hold both slots inside retrieve; the third is parked at admission
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(engine.available_slots(), 0);
    assert_eq!(mock.in_flight(), 2);
    assert_eq!(mock.retrieve_calls(), 0);

    tokio::time::sleep(Duration::from_millis(550)).await;
    assert_eq!(mock.retrieve_calls(), 2);
    assert_eq!(mock.in_flight(), 2);

    let mut deliveries = Vec::new();
    for handle in handles {
        deliveries.push(handle.await.unwrap().unwrap());
    }
    assert_eq!(mock.retrieve_calls(), 3);
    assert_eq!(mock.max_in_flight(), 2);
    assert_eq!(engine.available_slots(), 2);

    for delivery in deliveries {
        collect(delivery).await;
    }
    assert_eq!(scratch_count(dir.path()), 0);
}

#[tokio::test]
async fn test_cancelled_retrieve_releases_slot_and_scratch() {
    let dir = tempfile::tempdir().unwrap();
    let config = MockExtractorConfig {
        retrieve_delay: Some(Duration::from_secs(2)),
        ..MockExtractorConfig::fast()
    };
    let mock = Arc::new(MockExtractor::new(config));
    let settings = EngineSettings::new(dir.path()).with_max_concurrent(1);
    let engine = Engine::new(settings, mock.clone());

    let cancelled = tokio::time::timeout(
        Duration::from_millis(300),
        engine.retrieve(&youtube_video().with_cookies("SID=abc")),
    )
    .await;
    assert!(cancelled.is_err());
    assert_eq!(mock.retrieve_calls(), 1);
    assert_eq!(mock.in_flight(), 0);
    assert_eq!(engine.available_slots(), 1);
    // Neither the partial transfer nor the cookie file survives
    assert_eq!(scratch_count(dir.path()), 0);
}

#[tokio::test]
async fn test_request_errors_surface_before_admission() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mock) = engine(dir.path(), DeploymentMode::Development, MockExtractorConfig::fast());

    let url = Url::parse("https://www.youtube.com/watch?v=abc123").unwrap();
    let request = RetrievalRequest::new(url, Platform::Youtube, MediaFormat::Video, None);
    let err = engine.retrieve(&request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFormatQuality);
    assert_eq!(mock.inspect_calls(), 0);
}

// ============================================================================
// Fallback ladder
// ============================================================================

#[tokio::test]
async fn test_production_transient_failure_falls_back_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = MockExtractorConfig {
        retrieve_stderr: vec![TRANSIENT_STDERR.to_string()],
        ..MockExtractorConfig::fast()
    };
    let payload = config.payload.clone();
    let (engine, mock) = engine(dir.path(), DeploymentMode::Production, config);

    let delivery = engine.retrieve(&youtube_video()).await.unwrap();
    assert_eq!(mock.retrieve_calls(), 2);

    let attempts: Vec<Attempt> = mock
        .invocations()
        .iter()
        .skip(1)
        .map(|i| i.options.attempt)
        .collect();
    assert_eq!(attempts, vec![Attempt::Primary, Attempt::Fallback]);
    let fallback = &mock.invocations()[2].options;
    assert!(!fallback.check_certificates);
    assert_eq!(fallback.extractor_args, None);

    // The primary attempt's partial file was purged; only the output remains
    assert_eq!(scratch_count(dir.path()), 1);
    assert_eq!(collect(delivery).await, payload);
    assert_eq!(scratch_count(dir.path()), 0);
}

#[tokio::test]
async fn test_fallback_is_attempted_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = MockExtractorConfig {
        retrieve_stderr: vec![TRANSIENT_STDERR.to_string(); 3],
        ..MockExtractorConfig::fast()
    };
    let (engine, mock) = engine(dir.path(), DeploymentMode::Production, config);

    let err = engine.retrieve(&youtube_video()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExtractionTransientFailure);
    assert_eq!(mock.retrieve_calls(), 2);
    assert_eq!(scratch_count(dir.path()), 0);
    assert_eq!(engine.available_slots(), 2);
}

#[tokio::test]
async fn test_failed_fallback_reports_transient_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = MockExtractorConfig {
        retrieve_stderr: vec![
            TRANSIENT_STDERR.to_string(),
            "ERROR: [youtube] abc123: HTTP Error 404: Not Found".to_string(),
        ],
        ..MockExtractorConfig::fast()
    };
    let (engine, mock) = engine(dir.path(), DeploymentMode::Production, config);

    let err = engine.retrieve(&youtube_video()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExtractionTransientFailure);
    assert_eq!(err.unavailable_reason(), None);
    assert!(err.message().contains("YouTube"));
    assert!(!err.message().contains("404"));
    assert_eq!(mock.retrieve_calls(), 2);
    assert_eq!(scratch_count(dir.path()), 0);
}

#[tokio::test]
async fn test_no_fallback_in_development() {
    let dir = tempfile::tempdir().unwrap();
    let config = MockExtractorConfig {
        retrieve_stderr: vec![TRANSIENT_STDERR.to_string()],
        ..MockExtractorConfig::fast()
    };
    let (engine, mock) = engine(dir.path(), DeploymentMode::Development, config);

    let err = engine.retrieve(&youtube_video()).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(mock.retrieve_calls(), 1);
    assert_eq!(scratch_count(dir.path()), 0);
}

#[tokio::test]
async fn test_no_fallback_for_auth_wall() {
    let dir = tempfile::tempdir().unwrap();
    let config = MockExtractorConfig {
        retrieve_stderr: vec!["ERROR: [youtube] abc123: Sign in to confirm you're not a bot".to_string()],
        ..MockExtractorConfig::fast()
    };
    let (engine, mock) = engine(dir.path(), DeploymentMode::Production, config);

    let err = engine.retrieve(&youtube_video()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamAuthRequired);
    assert_eq!(mock.retrieve_calls(), 1);
}

#[tokio::test]
async fn test_probe_failure_does_not_consume_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let config = MockExtractorConfig {
        inspect_stderr: Some("ERROR: [youtube] abc123: Private video. Sign in if you've been granted access".into()),
        ..MockExtractorConfig::fast()
    };
    let (engine, mock) = engine(dir.path(), DeploymentMode::Production, config);

    let err = engine.retrieve(&youtube_video()).await.unwrap_err();
    assert_eq!(err.unavailable_reason(), Some(UnavailableReason::Private));
    assert_eq!(mock.retrieve_calls(), 0);
}

// ============================================================================
// Output verification
// ============================================================================

#[tokio::test]
async fn test_empty_output_is_incomplete() {
    let dir = tempfile::tempdir().unwrap();
    let config = MockExtractorConfig {
        payload: Vec::new(),
        ..MockExtractorConfig::fast()
    };
    let (engine, _mock) = engine(dir.path(), DeploymentMode::Development, config);

    let err = engine.retrieve(&youtube_video()).await.unwrap_err();
    assert!(matches!(err, DownloadError::IncompleteOutput(_)));
    assert_eq!(scratch_count(dir.path()), 0);
}

#[tokio::test]
async fn test_audio_output_extension() {
    let dir = tempfile::tempdir().unwrap();
    let config = MockExtractorConfig {
        extension: "mp3".to_string(),
        ..MockExtractorConfig::fast()
    };
    let (engine, _mock) = engine(dir.path(), DeploymentMode::Development, config);
    let request =
        RetrievalRequest::parse("https://www.tiktok.com/@u/video/1", "tiktok", "audio", Some("720p")).unwrap();

    let delivery = engine.retrieve(&request).await.unwrap();
    assert_eq!(delivery.filename, "Mock Clip.mp3");
    assert_eq!(delivery.content_type, "audio/mpeg");
    drop(delivery);
    assert_eq!(scratch_count(dir.path()), 0);
}

// ============================================================================
// Credentials
// ============================================================================

#[tokio::test]
async fn test_request_cookies_live_for_the_job_only() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mock) = engine(dir.path(), DeploymentMode::Development, MockExtractorConfig::fast());
    let request = youtube_video().with_cookies("SID=abc; bad; PREF=f1=1");

    let delivery = engine.retrieve(&request).await.unwrap();

    let invocations = mock.invocations();
    assert_eq!(invocations.len(), 2);
    for invocation in &invocations {
        match &invocation.options.cookies {
            Some(CookieSource::File(path)) => {
                assert!(path.starts_with(dir.path()));
                assert!(invocation.cookie_file_present);
            }
            other => panic!("expected a cookie file, got {:?}", other),
        }
    }
    // Artifact is gone once the engine returns; only the media file is left
    assert_eq!(scratch_count(dir.path()), 1);
    drop(delivery);
    assert_eq!(scratch_count(dir.path()), 0);
}

#[tokio::test]
async fn test_credential_write_error_is_soft() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-directory");
    std::fs::write(&blocker, b"x").unwrap();

    let mock = Arc::new(MockExtractor::new(MockExtractorConfig::fast()));
    let engine = Engine::new(EngineSettings::new(&blocker), mock.clone());
    let request = youtube_video().with_cookies("SID=abc");

    let info = engine.probe(&request).await.unwrap();
    assert_eq!(info.title, "Mock Clip");
    assert_eq!(mock.invocations()[0].options.cookies, None);
}

#[tokio::test]
async fn test_provisioned_cookies_in_production() {
    let dir = tempfile::tempdir().unwrap();
    let provisioned = dir.path().join("provisioned_cookies.txt");
    std::fs::write(&provisioned, "# Netscape HTTP Cookie File\n").unwrap();
    let scratch = dir.path().join("scratch");

    let mock = Arc::new(MockExtractor::new(MockExtractorConfig::fast()));
    let settings = EngineSettings::new(&scratch)
        .with_deployment(DeploymentMode::Production)
        .with_provisioned_cookies(&provisioned);
    let engine = Engine::new(settings, mock.clone());

    engine.probe(&youtube_video()).await.unwrap();
    assert_eq!(
        mock.invocations()[0].options.cookies,
        Some(CookieSource::File(provisioned.clone()))
    );
    assert!(provisioned.exists());

    // Profiles without the provisioned variant stay anonymous
    let request =
        RetrievalRequest::parse("https://www.reddit.com/r/a/comments/1", "reddit", "video", Some("480p")).unwrap();
    engine.probe(&request).await.unwrap();
    assert_eq!(mock.invocations()[1].options.cookies, None);
}

#[tokio::test]
async fn test_browser_cookies_in_development() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockExtractor::new(MockExtractorConfig::fast()));
    let settings = EngineSettings::new(dir.path()).with_cookies_browser("firefox");
    let engine = Engine::new(settings, mock.clone());

    engine.probe(&youtube_video()).await.unwrap();
    assert_eq!(
        mock.invocations()[0].options.cookies,
        Some(CookieSource::Browser("firefox".to_string()))
    );

    // Request cookies win over the browser profile
    engine.probe(&youtube_video().with_cookies("SID=1")).await.unwrap();
    assert!(matches!(mock.invocations()[1].options.cookies, Some(CookieSource::File(_))));
}

#[tokio::test]
async fn test_scratch_baseline_restored_across_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let config = MockExtractorConfig {
        retrieve_stderr: vec![TRANSIENT_STDERR.to_string()],
        ..MockExtractorConfig::fast()
    };
    let (engine, _mock) = engine(dir.path(), DeploymentMode::Development, config);
    let baseline = scratch_count(dir.path());

    // failed job with cookies
    let _ = engine.retrieve(&youtube_video().with_cookies("SID=1")).await.unwrap_err();
    assert_eq!(scratch_count(dir.path()), baseline);

    // successful job, stream dropped half way
    let delivery = engine.retrieve(&youtube_video().with_cookies("SID=1")).await.unwrap();
    let mut stream = delivery.stream;
    assert!(stream.next().await.unwrap().is_ok());
    drop(stream);
    assert_eq!(scratch_count(dir.path()), baseline);
}

#[tokio::test]
async fn test_quality_tiers_reach_the_extractor() {
    let dir = tempfile::tempdir().unwrap();
    let (engine, mock) = engine(dir.path(), DeploymentMode::Development, MockExtractorConfig::fast());
    let url = Url::parse("https://www.youtube.com/watch?v=abc123").unwrap();
    let request = RetrievalRequest::new(url, Platform::Youtube, MediaFormat::Video, Some(Quality::Sd360));

    drop(engine.retrieve(&request).await.unwrap());
    let selector = mock.invocations()[1].options.format_selector.clone().unwrap();
    assert!(selector.contains("[height<=?360]"));
}
