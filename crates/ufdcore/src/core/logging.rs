//! Logging initialization and configuration checking
//!
//! This module provides:
//! - Logger initialization (terminal + file)
//! - Credential configuration report at startup

use anyhow::Result;
use simplelog::*;
use std::fs::File;
use std::path::Path;

use crate::core::config;
use crate::download::types::DeploymentMode;

/// Initialize logger for both terminal and file output
///
/// Terminal output goes to stderr only: stdout may carry media bytes.
///
/// # Arguments
/// * `log_file_path` - Path to the log file
/// * `level` - Minimum level for both sinks
pub fn init_logger(log_file_path: &str, level: LevelFilter) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto),
        WriteLogger::new(level, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs how requests without their own cookies will be authenticated
///
/// - production: pre-provisioned YTDL_COOKIES_FILE
/// - development: YTDL_COOKIES_BROWSER profile
///
/// Requests that carry a cookie string always use it instead.
pub fn log_cookies_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🍪 Cookies Configuration Check ({})", *config::DEPLOYMENT_MODE);
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    match *config::DEPLOYMENT_MODE {
        DeploymentMode::Production => match config::YTDL_COOKIES_FILE.as_deref() {
            Some(cookies_file) => {
                let cookies_path = shellexpand::tilde(cookies_file).into_owned();
                if Path::new(&cookies_path).exists() {
                    log::info!("✅ YTDL_COOKIES_FILE: {}", cookies_path);
                    log::info!("   Used for requests that carry no cookies");
                } else {
                    log::error!("❌ YTDL_COOKIES_FILE: {} (FILE NOT FOUND!)", cookies_path);
                    log::error!("   Anonymous requests to sign-in gated content will fail");
                }
            }
            None => {
                log::warn!("⚠️  YTDL_COOKIES_FILE: not set");
                log::warn!("   Only request-supplied cookies will be used");
            }
        },
        DeploymentMode::Development => {
            let browser = config::YTDL_COOKIES_BROWSER.as_str();
            if browser.is_empty() {
                log::warn!("⚠️  YTDL_COOKIES_BROWSER: not set");
                log::warn!("   Only request-supplied cookies will be used");
            } else {
                log::info!("✅ YTDL_COOKIES_BROWSER: {}", browser);
                log::info!("   Will extract cookies from the local browser profile");
            }
        }
    }

    log::info!("📁 Scratch directory: {}", config::SCRATCH_DIR.display());
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
