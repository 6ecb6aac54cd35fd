//! Extraction capability seam.
//!
//! The engine never talks to yt-dlp directly; it drives an [`Extractor`] with an
//! [`ExtractionOptions`] bag. `YtDlpExtractor` is the production backend, tests
//! plug in scripted ones.

pub mod ytdlp;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Child;

use crate::core::utils::format_size_mb;
use crate::download::error::DownloadError;
use crate::download::options::ExtractionOptions;
use crate::download::types::{FormatEntry, FormatKind, MediaInfo, Platform};
use crate::download::ytdlp_errors;

pub use ytdlp::YtDlpExtractor;

/// Why an extractor invocation did not succeed.
#[derive(Debug)]
pub enum ExtractorFailure {
    /// The process could not be started
    Spawn(String),
    /// The process exceeded its deadline and was killed
    TimedOut(Duration),
    /// The process exited unsuccessfully; `stderr` is a bounded tail
    Exited { code: Option<i32>, stderr: String },
    /// The process succeeded but its metadata output could not be read
    BadMetadata(String),
}

impl ExtractorFailure {
    /// Maps the failure onto the error taxonomy. Only `Exited` stderr goes through the classifier.
    pub fn into_download_error(self, platform: Platform) -> DownloadError {
        match self {
            ExtractorFailure::Spawn(e) => {
                log::error!("❌ Failed to start extractor: {}", e);
                DownloadError::ExtractionFailed(format!("Could not start the extractor for {}", platform.label()))
            }
            ExtractorFailure::TimedOut(limit) => {
                log::error!("❌ Extractor timed out after {}s", limit.as_secs());
                DownloadError::ExtractionFailed(format!(
                    "{} did not respond within {} seconds",
                    platform.label(),
                    limit.as_secs()
                ))
            }
            ExtractorFailure::Exited { code, stderr } => {
                let error_type = ytdlp_errors::analyze_ytdlp_error(&stderr);
                log::error!("❌ Extractor exited with {:?}, classified as {:?}", code, error_type);
                log::info!("{}", ytdlp_errors::get_fix_recommendations(error_type));
                ytdlp_errors::classify(&stderr, platform)
            }
            ExtractorFailure::BadMetadata(e) => {
                log::error!("❌ Unreadable metadata: {}", e);
                DownloadError::ExtractionFailed(format!("{} returned unreadable metadata", platform.label()))
            }
        }
    }
}

/// Backend that turns a URL plus options into metadata or media bytes.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Human-readable backend name (e.g., "yt-dlp")
    fn name(&self) -> &str;

    /// Inspect-only invocation returning metadata.
    async fn inspect(&self, options: &ExtractionOptions, timeout: Duration) -> Result<MediaInfo, ExtractorFailure>;

    /// Download-mode invocation writing to the options' output template.
    async fn retrieve(&self, options: &ExtractionOptions, timeout: Duration) -> Result<(), ExtractorFailure>;

    /// Starts a download-to-stdout process with piped stdout and stderr.
    ///
    /// The child must be created with `kill_on_drop(true)`.
    fn spawn_pipe(&self, options: &ExtractionOptions) -> Result<Child, ExtractorFailure>;
}

/// Keeps the last `max_lines` lines of process output.
pub fn stderr_tail(raw: &[u8], max_lines: usize) -> String {
    let text = String::from_utf8_lossy(raw);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    title: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    vcodec: Option<String>,
    acodec: Option<String>,
    height: Option<u32>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
}

impl RawFormat {
    fn has_video(&self) -> bool {
        self.vcodec.as_deref().is_some_and(|c| c != "none")
    }

    fn has_audio(&self) -> bool {
        self.acodec.as_deref().is_some_and(|c| c != "none")
    }
}

/// Parses `yt-dlp -J` output into [`MediaInfo`].
///
/// Formats are de-duplicated by quality label (first seen wins), then ranked
/// tallest video first with audio-only entries last.
pub fn parse_media_info(json: &[u8]) -> Result<MediaInfo, ExtractorFailure> {
    let raw: RawInfo = serde_json::from_slice(json).map_err(|e| ExtractorFailure::BadMetadata(e.to_string()))?;

    let mut formats: Vec<(u32, FormatEntry)> = Vec::new();
    for f in &raw.formats {
        let (rank, entry_kind, label) = if f.has_video() {
            match f.height {
                Some(h) => (h, FormatKind::Video, format!("{}p", h)),
                None => continue,
            }
        } else if f.has_audio() {
            (0, FormatKind::Audio, "audio".to_string())
        } else {
            continue;
        };
        if formats.iter().any(|(_, e)| e.quality == label) {
            continue;
        }
        let size = f
            .filesize
            .or(f.filesize_approx)
            .filter(|s| *s > 0.0)
            .map(|s| format_size_mb(s as u64));
        formats.push((
            rank,
            FormatEntry {
                quality: label,
                kind: entry_kind,
                size,
            },
        ));
    }
    formats.sort_by(|a, b| b.0.cmp(&a.0));

    Ok(MediaInfo {
        title: raw.title.unwrap_or_default(),
        thumbnail: raw.thumbnail,
        duration: raw.duration.filter(|d| *d >= 0.0).map(|d| d.round() as u64),
        formats: formats.into_iter().map(|(_, e)| e).collect(),
    })
}
