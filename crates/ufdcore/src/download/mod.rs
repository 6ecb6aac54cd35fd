//! Download orchestration: format policy, platform profiles, credentials,
//! the bounded extraction engine and streaming delivery

pub mod cookies;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod format;
pub mod options;
pub mod platform;
pub mod scratch;
pub mod types;
pub mod ytdlp;
pub mod ytdlp_errors;

// Re-exports for convenience
pub use delivery::{ByteStream, MediaDelivery};
pub use engine::{Engine, EngineSettings, JobState};
pub use error::{DownloadError, ErrorKind, UnavailableReason};
pub use extractor::{Extractor, ExtractorFailure, YtDlpExtractor};
pub use types::{
    AuthMetadata, DeliveryMode, DeploymentMode, FormatEntry, FormatKind, MediaFormat, MediaInfo, Platform, Quality,
    RetrievalRequest,
};
