//! Configuration values for the engine.
//! Everything here is read once from the environment on first access.

use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::download::types::{DeliveryMode, DeploymentMode};

/// Parses a trimmed environment variable, `None` when unset, blank or invalid.
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
}

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Browser to extract cookies from in development deployments
/// Read from YTDL_COOKIES_BROWSER environment variable
/// Supported by yt-dlp: chrome, firefox, safari, brave, chromium, edge, opera, vivaldi
/// Empty string disables browser extraction
pub static YTDL_COOKIES_BROWSER: Lazy<String> =
    Lazy::new(|| env::var("YTDL_COOKIES_BROWSER").unwrap_or_else(|_| String::new()));

/// Pre-provisioned Netscape cookies file used by production deployments
/// when a request carries no cookies of its own.
/// Read from YTDL_COOKIES_FILE environment variable
pub static YTDL_COOKIES_FILE: Lazy<Option<String>> = Lazy::new(|| {
    env::var("YTDL_COOKIES_FILE")
        .ok()
        .and_then(|s| if s.trim().is_empty() { None } else { Some(s) })
});

/// Scratch directory for credential artifacts and temporary media files
/// Read from SCRATCH_DIR environment variable
/// Defaults to `<system temp>/ufd`, supports tilde (~) expansion
pub static SCRATCH_DIR: Lazy<PathBuf> = Lazy::new(|| match env::var("SCRATCH_DIR") {
    Ok(dir) if !dir.trim().is_empty() => PathBuf::from(shellexpand::tilde(dir.trim()).into_owned()),
    _ => env::temp_dir().join("ufd"),
});

/// Deployment mode: "production" or "development"
/// Read from UFD_ENV environment variable
/// Default: development
pub static DEPLOYMENT_MODE: Lazy<DeploymentMode> =
    Lazy::new(|| env_parse("UFD_ENV").unwrap_or(DeploymentMode::Development));

/// Delivery mode: "file" (temp file relay) or "pipe" (direct stdout pipe)
/// Read from DELIVERY_MODE environment variable
/// Default: file
pub static DELIVERY_MODE: Lazy<DeliveryMode> =
    Lazy::new(|| env_parse("DELIVERY_MODE").unwrap_or(DeliveryMode::FileRelay));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: ufd.log
pub static LOG_FILE_PATH: Lazy<String> = Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "ufd.log".to_string()));

/// Queue processing configuration
pub mod queue {
    use once_cell::sync::Lazy;

    /// Default number of concurrent retrieval jobs
    /// Kept small to avoid upstream rate limiting
    pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 2;

    /// Maximum number of concurrent retrieval jobs
    /// Read from MAX_CONCURRENT_DOWNLOADS environment variable
    pub static MAX_CONCURRENT_DOWNLOADS: Lazy<usize> = Lazy::new(|| {
        super::env_parse("MAX_CONCURRENT_DOWNLOADS")
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONCURRENT_DOWNLOADS)
    });
}

/// Download configuration
pub mod download {
    use super::Duration;

    /// Timeout for a full yt-dlp retrieval (in seconds)
    pub const YTDLP_TIMEOUT_SECS: u64 = 600; // 10 minutes

    /// Timeout for an inspect-only metadata probe (in seconds)
    pub const PROBE_TIMEOUT_SECS: u64 = 120;

    /// How long to wait for a piped yt-dlp process to exit once stdout is exhausted
    pub const DRAIN_TIMEOUT_SECS: u64 = 30;

    /// Chunk size for streamed delivery (8 KiB)
    pub const CHUNK_SIZE: usize = 8 * 1024;

    /// Forward lifetime of generated credential cookies (days)
    pub const CREDENTIAL_TTL_DAYS: i64 = 365;

    /// Socket timeout passed to yt-dlp (in seconds)
    pub const SOCKET_TIMEOUT_SECS: u32 = 30;

    /// Lines of yt-dlp stderr kept for error classification
    pub const STDERR_TAIL_LINES: usize = 200;

    /// yt-dlp retrieval timeout duration
    pub fn ytdlp_timeout() -> Duration {
        Duration::from_secs(YTDLP_TIMEOUT_SECS)
    }

    /// Metadata probe timeout duration
    pub fn probe_timeout() -> Duration {
        Duration::from_secs(PROBE_TIMEOUT_SECS)
    }

    /// Pipe drain timeout duration
    pub fn drain_timeout() -> Duration {
        Duration::from_secs(DRAIN_TIMEOUT_SECS)
    }
}

/// Request pacing applied to yt-dlp to stay below upstream rate limits
pub mod pacing {
    /// Seconds to sleep between extraction requests (--sleep-requests)
    pub const SLEEP_REQUESTS_SECS: u32 = 3;

    /// Minimum seconds to sleep before each download (--sleep-interval)
    pub const SLEEP_INTERVAL_SECS: u32 = 2;

    /// Maximum seconds to sleep before each download (--max-sleep-interval)
    pub const MAX_SLEEP_INTERVAL_SECS: u32 = 5;

    /// Retries for the primary attempt
    pub const RETRIES: u32 = 10;

    /// Fragment retries for the primary attempt
    pub const FRAGMENT_RETRIES: u32 = 10;

    /// Retries for the fallback attempt
    pub const FALLBACK_RETRIES: u32 = 20;

    /// Fragment retries for the fallback attempt
    pub const FALLBACK_FRAGMENT_RETRIES: u32 = 20;

    /// Extractor retries for the fallback attempt
    pub const FALLBACK_EXTRACTOR_RETRIES: u32 = 5;
}
