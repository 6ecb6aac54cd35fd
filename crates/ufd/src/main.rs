use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use ufdcore::core::{config, init_logger, log_cookies_configuration};
use ufdcore::download::ytdlp::check_and_update_ytdlp;
use ufdcore::download::{DeliveryMode, Engine, EngineSettings, MediaDelivery, RetrievalRequest, YtDlpExtractor};

mod cli;

use cli::{Cli, Commands, Target};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env before any config is read
    let _ = dotenvy::dotenv();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    init_logger(&config::LOG_FILE_PATH, level)?;

    match cli.command {
        Commands::Info { target } => {
            log_cookies_configuration();
            let engine = build_engine(None);
            let request = build_request(&target)?;
            let info = engine.probe(&request).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(())
        }
        Commands::Get { target, output, pipe } => {
            log_cookies_configuration();
            let delivery_mode = pipe.then_some(DeliveryMode::DirectPipe);
            let engine = build_engine(delivery_mode);
            let request = build_request(&target)?;
            let delivery = engine.retrieve(&request).await?;
            write_delivery(delivery, output.as_deref()).await
        }
        Commands::UpdateExtractor => {
            let outcome = check_and_update_ytdlp(&config::YTDL_BIN).await?;
            log::info!("yt-dlp update: {:?}", outcome);
            Ok(())
        }
    }
}

fn build_engine(delivery: Option<DeliveryMode>) -> Engine {
    let mut settings = EngineSettings::from_env();
    if let Some(mode) = delivery {
        settings = settings.with_delivery(mode);
    }
    Engine::new(settings, Arc::new(YtDlpExtractor::new()))
}

fn build_request(target: &Target) -> Result<RetrievalRequest> {
    let mut request = RetrievalRequest::parse(&target.url, &target.platform, &target.format, Some(&target.quality))?;
    if let Some(cookie) = &target.cookie {
        request = request.with_cookies(cookie.clone());
    }
    Ok(request)
}

/// Resolves `-o`: stdout for "-", a directory gets the delivery filename.
fn output_path(output: Option<&str>, filename: &str) -> Option<PathBuf> {
    match output {
        Some("-") => None,
        Some(path) if Path::new(path).is_dir() => Some(Path::new(path).join(filename)),
        Some(path) => Some(PathBuf::from(path)),
        None => Some(PathBuf::from(filename)),
    }
}

async fn write_delivery(delivery: MediaDelivery, output: Option<&str>) -> Result<()> {
    log::info!(
        "⬇️ {} ({}, {} bytes)",
        delivery.filename,
        delivery.content_type,
        delivery
            .content_length
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    );

    match output_path(output, &delivery.filename) {
        None => {
            let mut stdout = tokio::io::stdout();
            copy_stream(delivery, &mut stdout).await?;
            Ok(())
        }
        Some(path) => {
            let mut file = tokio::fs::File::create(&path)
                .await
                .with_context(|| format!("cannot create {}", path.display()))?;
            match copy_stream(delivery, &mut file).await {
                Ok(written) => {
                    log::info!("✅ Saved {} bytes to {}", written, path.display());
                    Ok(())
                }
                Err(e) => {
                    drop(file);
                    let _ = tokio::fs::remove_file(&path).await;
                    Err(e)
                }
            }
        }
    }
}

async fn copy_stream<W: AsyncWrite + Unpin>(delivery: MediaDelivery, sink: &mut W) -> Result<u64> {
    let mut stream = delivery.stream;
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        sink.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    sink.flush().await?;
    Ok(written)
}
