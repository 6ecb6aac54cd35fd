//! Mock extractor
//!
//! Tracks concurrency, records every option bag it was driven with and plays
//! back scripted failures in order.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Child;
use ufdcore::download::options::{CookieSource, ExtractionOptions, OutputTarget};
use ufdcore::download::{Extractor, ExtractorFailure, FormatEntry, FormatKind, MediaInfo};

/// Behaviour of the mock
#[derive(Debug, Clone)]
pub struct MockExtractorConfig {
    /// Time spent inside every inspect/retrieve call
    pub delay: Duration,
    /// Overrides `delay` for retrieve calls
    pub retrieve_delay: Option<Duration>,
    /// Bytes written as the finished output
    pub payload: Vec<u8>,
    /// Extension the output is written with
    pub extension: String,
    /// stderr returned by inspect, if it should fail
    pub inspect_stderr: Option<String>,
    /// stderr for successive retrieve calls; a call past the end succeeds
    pub retrieve_stderr: Vec<String>,
    /// Script run by `sh -c` for piped transfers
    pub pipe_script: String,
}

impl Default for MockExtractorConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(10),
            retrieve_delay: None,
            payload: (0..50_000u32).map(|i| (i % 256) as u8).collect(),
            extension: "mp4".to_string(),
            inspect_stderr: None,
            retrieve_stderr: Vec::new(),
            pipe_script: "printf 'hello'".to_string(),
        }
    }
}

impl MockExtractorConfig {
    /// Config with no artificial delay
    pub fn fast() -> Self {
        Self {
            delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// One recorded invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    pub options: ExtractionOptions,
    /// Whether the cookie file (if any) existed when the call was made
    pub cookie_file_present: bool,
}

pub struct MockExtractor {
    config: MockExtractorConfig,
    retrieve_failures: Mutex<VecDeque<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    inspect_calls: AtomicUsize,
    retrieve_calls: AtomicUsize,
    invocations: Mutex<Vec<Invocation>>,
}

/// Decrements the in-flight counter when a call ends, however it ends
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockExtractor {
    pub fn new(config: MockExtractorConfig) -> Self {
        let failures = config.retrieve_stderr.iter().cloned().collect();
        Self {
            config,
            retrieve_failures: Mutex::new(failures),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            inspect_calls: AtomicUsize::new(0),
            retrieve_calls: AtomicUsize::new(0),
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn inspect_calls(&self) -> usize {
        self.inspect_calls.load(Ordering::SeqCst)
    }

    /// Calls currently inside inspect/retrieve
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn retrieve_calls(&self) -> usize {
        self.retrieve_calls.load(Ordering::SeqCst)
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    fn enter(&self, options: &ExtractionOptions) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let cookie_file_present = match &options.cookies {
            Some(CookieSource::File(path)) => path.is_file(),
            _ => false,
        };
        self.invocations.lock().unwrap().push(Invocation {
            options: options.clone(),
            cookie_file_present,
        });
        InFlight(&self.in_flight)
    }

    fn media_info() -> MediaInfo {
        MediaInfo {
            title: "Mock Clip".to_string(),
            thumbnail: Some("https://example.com/thumb.jpg".to_string()),
            duration: Some(42),
            formats: vec![
                FormatEntry {
                    quality: "720p".to_string(),
                    kind: FormatKind::Video,
                    size: Some("5MB".to_string()),
                },
                FormatEntry {
                    quality: "audio".to_string(),
                    kind: FormatKind::Audio,
                    size: None,
                },
            ],
        }
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn inspect(&self, options: &ExtractionOptions, _timeout: Duration) -> Result<MediaInfo, ExtractorFailure> {
        self.inspect_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter(options);
        tokio::time::sleep(self.config.delay).await;
        match &self.config.inspect_stderr {
            Some(stderr) => Err(ExtractorFailure::Exited {
                code: Some(1),
                stderr: stderr.clone(),
            }),
            None => Ok(Self::media_info()),
        }
    }

    async fn retrieve(&self, options: &ExtractionOptions, _timeout: Duration) -> Result<(), ExtractorFailure> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter(options);

        let OutputTarget::File(template) = &options.output else {
            return Err(ExtractorFailure::Spawn("retrieve called without a file target".into()));
        };
        let output = template.replace("%(ext)s", &self.config.extension);
        let partial = format!("{}.part", output);

        // Like yt-dlp, the transfer lands in a .part file first
        std::fs::write(&partial, b"partial").map_err(|e| ExtractorFailure::Spawn(e.to_string()))?;
        tokio::time::sleep(self.config.retrieve_delay.unwrap_or(self.config.delay)).await;

        let failure = self.retrieve_failures.lock().unwrap().pop_front();
        if let Some(stderr) = failure {
            return Err(ExtractorFailure::Exited {
                code: Some(1),
                stderr,
            });
        }

        std::fs::write(&output, &self.config.payload).map_err(|e| ExtractorFailure::Spawn(e.to_string()))?;
        std::fs::remove_file(&partial).map_err(|e| ExtractorFailure::Spawn(e.to_string()))?;
        Ok(())
    }

    fn spawn_pipe(&self, options: &ExtractionOptions) -> Result<Child, ExtractorFailure> {
        let _guard = self.enter(options);
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(&self.config.pipe_script);
        if let Some(CookieSource::File(path)) = &options.cookies {
            cmd.env("COOKIE_FILE", path);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExtractorFailure::Spawn(e.to_string()))
    }
}
