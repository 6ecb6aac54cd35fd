use std::time::Duration;

use tokio::process::Command;

use crate::core::error::AppError;
use crate::core::process::run_with_timeout;

/// yt-dlp exits with this code from `-U` when it was installed through pip
const PIP_INSTALL_EXIT_CODE: i32 = 100;

const SELF_UPDATE_TIMEOUT: Duration = Duration::from_secs(30);
const PIP_UPDATE_TIMEOUT: Duration = Duration::from_secs(60);

/// Result of an extractor update check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    AlreadyCurrent,
    Updated(String),
    /// Nothing changed; the reason has been logged
    Skipped(String),
}

/// Returns the trimmed `--version` output of the extractor binary.
pub async fn ytdlp_version(bin: &str) -> Result<String, AppError> {
    let output = run_with_timeout(Command::new(bin).arg("--version"), Duration::from_secs(10)).await?;
    if !output.status.success() {
        return Err(AppError::Process(format!(
            "{} --version exited with {:?}",
            bin,
            output.status.code()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Checks for and installs a newer yt-dlp.
///
/// Runs `yt-dlp -U`; when yt-dlp reports a pip installation, retries with
/// `pip3`/`pip install --upgrade yt-dlp`. Update failures are logged and reported
/// as `Skipped`, never as errors, so startup can continue.
pub async fn check_and_update_ytdlp(bin: &str) -> Result<UpdateOutcome, AppError> {
    match ytdlp_version(bin).await {
        Ok(version) => log::info!("Current yt-dlp version: {}", version),
        Err(e) => log::warn!("Failed to get yt-dlp version: {}. Will try to update anyway.", e),
    }

    log::info!("Checking for yt-dlp updates...");
    let output = match run_with_timeout(Command::new(bin).arg("-U"), SELF_UPDATE_TIMEOUT).await {
        Ok(output) => output,
        Err(e) => {
            log::warn!("yt-dlp update check failed: {}. Continuing anyway.", e);
            return Ok(UpdateOutcome::Skipped(e.to_string()));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if output.status.success() {
        return Ok(parse_self_update(&stdout));
    }

    if output.status.code() == Some(PIP_INSTALL_EXIT_CODE) {
        log::info!("yt-dlp is installed via pip. Attempting to update via pip...");
        return Ok(update_via_pip().await);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    log::warn!(
        "yt-dlp update check failed (exit code: {:?}): {}",
        output.status.code(),
        stderr.trim()
    );
    Ok(UpdateOutcome::Skipped(format!("exit code {:?}", output.status.code())))
}

fn parse_self_update(stdout: &str) -> UpdateOutcome {
    let lower = stdout.to_lowercase();
    if lower.contains("up to date") || lower.contains("up-to-date") {
        log::info!("yt-dlp is already up to date");
        UpdateOutcome::AlreadyCurrent
    } else if lower.contains("updated") {
        log::info!("yt-dlp updated successfully: {}", stdout);
        UpdateOutcome::Updated(stdout.to_string())
    } else {
        log::info!("yt-dlp update check completed: {}", stdout);
        UpdateOutcome::Skipped(stdout.to_string())
    }
}

async fn update_via_pip() -> UpdateOutcome {
    let mut last_error = String::from("no pip executable found");
    for pip in ["pip3", "pip"] {
        let mut cmd = Command::new(pip);
        cmd.args(["install", "--upgrade", "yt-dlp"]);
        match run_with_timeout(&mut cmd, PIP_UPDATE_TIMEOUT).await {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                log::info!("yt-dlp updated successfully via {}", pip);
                if stdout.contains("Requirement already satisfied") && !stdout.contains("Successfully installed") {
                    return UpdateOutcome::AlreadyCurrent;
                }
                return UpdateOutcome::Updated(format!("via {}", pip));
            }
            Ok(output) => {
                last_error = format!("{} failed with exit code {:?}", pip, output.status.code());
                log::debug!("{}", last_error);
            }
            Err(e) => {
                last_error = format!("{}: {}", pip, e);
                log::debug!("{} command error: {}", pip, e);
            }
        }
    }
    log::warn!(
        "Failed to update yt-dlp via pip/pip3. Last error: {}. Run 'pip install --upgrade yt-dlp' manually.",
        last_error
    );
    UpdateOutcome::Skipped(last_error)
}
