use strum::{AsRefStr, Display};
use thiserror::Error;

/// Why upstream content cannot be served even with a working extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum UnavailableReason {
    /// Private video or private account
    Private,
    /// Removed, deleted or never existed
    Removed,
    /// Geo-restricted for the server's region
    RegionBlocked,
    /// Age-gated content
    AgeRestricted,
    /// Unavailable for a reason the upstream did not state
    Other,
}

/// Closed error taxonomy of the retrieval pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedPlatform,
    InvalidFormatQuality,
    InvalidUrl,
    CredentialWriteError,
    UpstreamAuthRequired,
    UpstreamUnavailable,
    ExtractionTransientFailure,
    ExtractionFailed,
    IncompleteOutput,
    StreamingAborted,
}

/// Structured error type for retrieval operations.
///
/// Every terminal state of a job is reported as one of these variants.
/// Messages never contain cookie values.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Platform identifier not in the registry
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Unknown format/quality identifier or an invalid combination
    #[error("invalid format/quality: {0}")]
    InvalidFormatQuality(String),

    /// Malformed or non-http(s) source URL
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Credential artifact could not be written (soft: the job continues unauthenticated)
    #[error("failed to write credentials: {0}")]
    CredentialWrite(String),

    /// Upstream demands sign-in
    #[error("{0}")]
    UpstreamAuthRequired(String),

    /// Removed, private, region-blocked or age-gated content
    #[error("{message}")]
    UpstreamUnavailable { reason: UnavailableReason, message: String },

    /// Characteristic extractor breakage that a simplified retry may get past
    #[error("{0}")]
    ExtractionTransient(String),

    /// Any other extractor failure (spawn failure, timeout, unrecognized stderr)
    #[error("{0}")]
    ExtractionFailed(String),

    /// Extractor reported success but the output is missing or empty
    #[error("incomplete output: {0}")]
    IncompleteOutput(String),

    /// The transfer stopped before the stream was complete
    #[error("streaming aborted: {0}")]
    StreamingAborted(String),
}

impl DownloadError {
    /// Taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::UnsupportedPlatform(_) => ErrorKind::UnsupportedPlatform,
            DownloadError::InvalidFormatQuality(_) => ErrorKind::InvalidFormatQuality,
            DownloadError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            DownloadError::CredentialWrite(_) => ErrorKind::CredentialWriteError,
            DownloadError::UpstreamAuthRequired(_) => ErrorKind::UpstreamAuthRequired,
            DownloadError::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            DownloadError::ExtractionTransient(_) => ErrorKind::ExtractionTransientFailure,
            DownloadError::ExtractionFailed(_) => ErrorKind::ExtractionFailed,
            DownloadError::IncompleteOutput(_) => ErrorKind::IncompleteOutput,
            DownloadError::StreamingAborted(_) => ErrorKind::StreamingAborted,
        }
    }

    /// Sub-kind for `UpstreamUnavailable`
    pub fn unavailable_reason(&self) -> Option<UnavailableReason> {
        match self {
            DownloadError::UpstreamUnavailable { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Whether the fallback ladder may retry this failure
    pub fn is_transient(&self) -> bool {
        matches!(self, DownloadError::ExtractionTransient(_))
    }

    /// Whether the error was raised before any admission slot was taken
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            DownloadError::UnsupportedPlatform(_) | DownloadError::InvalidFormatQuality(_) | DownloadError::InvalidUrl(_)
        )
    }

    /// Returns the inner message
    pub fn message(&self) -> &str {
        match self {
            DownloadError::UnsupportedPlatform(msg)
            | DownloadError::InvalidFormatQuality(msg)
            | DownloadError::InvalidUrl(msg)
            | DownloadError::CredentialWrite(msg)
            | DownloadError::UpstreamAuthRequired(msg)
            | DownloadError::ExtractionTransient(msg)
            | DownloadError::ExtractionFailed(msg)
            | DownloadError::IncompleteOutput(msg)
            | DownloadError::StreamingAborted(msg) => msg,
            DownloadError::UpstreamUnavailable { message, .. } => message,
        }
    }
}
