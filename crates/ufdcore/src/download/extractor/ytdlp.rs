//! yt-dlp backend.
//!
//! Inspect and retrieve run yt-dlp as an async child with a deadline. The child is
//! killed when the call is dropped, so a cancelled job never leaves yt-dlp writing
//! into the scratch directory. The pipe mode hands its child to the delivery pipeline.

use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Child;

use super::{parse_media_info, stderr_tail, Extractor, ExtractorFailure};
use crate::core::config;
use crate::core::error::AppError;
use crate::core::process::run_with_timeout;
use crate::core::utils::truncate_for_log;
use crate::download::options::ExtractionOptions;
use crate::download::types::MediaInfo;

/// Extractor backed by the yt-dlp binary.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    bin: String,
}

impl YtDlpExtractor {
    /// Uses the binary configured in `YTDL_BIN`.
    pub fn new() -> Self {
        Self::with_bin(config::YTDL_BIN.as_str())
    }

    pub fn with_bin(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    async fn run(&self, options: &ExtractionOptions, timeout: Duration) -> Result<Output, ExtractorFailure> {
        log::info!("▶️ {} {}", self.bin, options.describe());

        let mut cmd = tokio::process::Command::new(&self.bin);
        cmd.args(options.to_args());
        let output = run_with_timeout(&mut cmd, timeout).await.map_err(|e| match e {
            AppError::Process(_) => ExtractorFailure::TimedOut(timeout),
            other => ExtractorFailure::Spawn(other.to_string()),
        })?;

        if output.status.success() {
            return Ok(output);
        }

        let stderr = stderr_tail(&output.stderr, config::download::STDERR_TAIL_LINES);
        log::error!(
            "yt-dlp failed (exit {:?}), stderr tail: {}",
            output.status.code(),
            truncate_for_log(&stderr, 500)
        );
        Err(ExtractorFailure::Exited {
            code: output.status.code(),
            stderr,
        })
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn inspect(&self, options: &ExtractionOptions, timeout: Duration) -> Result<MediaInfo, ExtractorFailure> {
        let output = self.run(options, timeout).await?;
        parse_media_info(&output.stdout)
    }

    async fn retrieve(&self, options: &ExtractionOptions, timeout: Duration) -> Result<(), ExtractorFailure> {
        self.run(options, timeout).await.map(|_| ())
    }

    fn spawn_pipe(&self, options: &ExtractionOptions) -> Result<Child, ExtractorFailure> {
        log::info!("▶️ {} {}", self.bin, options.describe());
        tokio::process::Command::new(&self.bin)
            .args(options.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExtractorFailure::Spawn(e.to_string()))
    }
}
