//! Process execution utilities with timeout support
//!
//! Provides helpers for running external processes (yt-dlp, pip)
//! with configurable timeouts so a hung process cannot hold an admission slot forever.

use std::process::{Output, Stdio};
use std::time::Duration;

use crate::core::error::AppError;

/// Run an async Command with a timeout.
///
/// The child is spawned with `kill_on_drop`, so it is killed both when the
/// deadline passes and when the returned future is dropped before completion.
/// Returns the process Output on success, or an AppError on timeout/IO failure.
pub async fn run_with_timeout(cmd: &mut tokio::process::Command, timeout: Duration) -> Result<Output, AppError> {
    cmd.stdin(Stdio::null()).kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(AppError::Io(e)),
        Err(_) => {
            log::error!("Process timed out after {}s, killed", timeout.as_secs());
            Err(AppError::Process(format!(
                "Process timed out after {}s",
                timeout.as_secs()
            )))
        }
    }
}
