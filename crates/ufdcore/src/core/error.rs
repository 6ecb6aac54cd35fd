use thiserror::Error;

use crate::download::error::DownloadError;

/// Centralized error type for the application layer
///
/// Library entry points that are not part of the retrieval pipeline
/// (extractor maintenance, logger setup, CLI glue) convert into this enum.
/// The retrieval pipeline itself reports [`DownloadError`].
#[derive(Error, Debug)]
pub enum AppError {
    /// Retrieval pipeline errors
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// JSON errors (yt-dlp metadata dumps)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// External process errors (spawn failure, timeout, bad exit code)
    #[error("Process error: {0}")]
    Process(String),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Process(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Process(err.to_string())
    }
}
