//! UFD - platform-aware media retrieval engine
//!
//! Drives yt-dlp on behalf of a caller: picks a format selector, shapes requests
//! per platform, turns browser cookies into a temporary cookie jar, bounds
//! concurrent extractions and streams the result back with guaranteed cleanup.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging and process helpers
//! - `download`: the retrieval pipeline

pub mod core;
pub mod download;

// Re-export commonly used types for convenience
pub use self::core::{config, AppError};
pub use download::{DownloadError, Engine, EngineSettings, MediaDelivery, RetrievalRequest, YtDlpExtractor};
