//! Streaming delivery pipeline.
//!
//! Both delivery modes hand the caller the same thing: a [`MediaDelivery`] whose
//! `stream` yields `Result<Bytes, DownloadError>`. Whatever a mode owns (temp file,
//! subprocess, admission permit, credential artifact) lives inside the stream state
//! and is released when the stream finishes or is dropped.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, Stream};
use strum::Display;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::OwnedSemaphorePermit;
use tokio::task::JoinHandle;

use crate::core::config;
use crate::download::cookies::CredentialArtifact;
use crate::download::error::DownloadError;
use crate::download::scratch::ScratchFiles;
use crate::download::types::{MediaInfo, Platform};
use crate::download::ytdlp_errors;

/// Byte stream handed to the caller
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, DownloadError>> + Send>>;

/// Successful retrieval: descriptor plus the bytes.
pub struct MediaDelivery {
    /// Sanitized title plus extension
    pub filename: String,
    pub content_type: &'static str,
    /// Known for file relay, `None` when piping
    pub content_length: Option<u64>,
    pub info: MediaInfo,
    pub stream: ByteStream,
}

impl fmt::Debug for MediaDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaDelivery")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// MIME type for a media file extension
pub fn content_type_for(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "opus" | "ogg" => "audio/ogg",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// File relay
// ---------------------------------------------------------------------------

struct FileRelay {
    path: PathBuf,
    file: Option<tokio::fs::File>,
    scratch: ScratchFiles,
    chunk_size: usize,
    sent: u64,
    finished: bool,
}

impl FileRelay {
    fn finish(&mut self) {
        self.finished = true;
        // Close before unlinking
        self.file = None;
        self.scratch.cleanup();
    }

    async fn next_chunk(&mut self) -> Option<Result<Bytes, DownloadError>> {
        if self.finished {
            return None;
        }
        if self.file.is_none() {
            match tokio::fs::File::open(&self.path).await {
                Ok(file) => self.file = Some(file),
                Err(e) => {
                    self.finish();
                    return Some(Err(DownloadError::StreamingAborted(format!("cannot open output: {}", e))));
                }
            }
        }
        let file = self.file.as_mut()?;
        let mut buf = BytesMut::with_capacity(self.chunk_size);
        match file.read_buf(&mut buf).await {
            Ok(0) => {
                log::info!("📤 Relayed {} bytes from {}", self.sent, self.path.display());
                self.finish();
                None
            }
            Ok(n) => {
                self.sent += n as u64;
                Some(Ok(buf.freeze()))
            }
            Err(e) => {
                log::error!("❌ Read error after {} bytes: {}", self.sent, e);
                self.finish();
                Some(Err(DownloadError::StreamingAborted(e.to_string())))
            }
        }
    }
}

impl Drop for FileRelay {
    fn drop(&mut self) {
        if !self.finished {
            log::warn!("⚠️ Consumer dropped file relay after {} bytes", self.sent);
            self.finish();
        }
    }
}

/// Streams a verified output file in fixed-size chunks, deleting it at EOF or on drop.
pub fn file_relay(path: &Path, scratch: ScratchFiles, chunk_size: usize) -> ByteStream {
    let state = FileRelay {
        path: path.to_path_buf(),
        file: None,
        scratch,
        chunk_size: chunk_size.max(1),
        sent: 0,
        finished: false,
    };
    Box::pin(stream::unfold(state, |mut state| async move {
        let item = state.next_chunk().await?;
        Some((item, state))
    }))
}

// ---------------------------------------------------------------------------
// Direct pipe
// ---------------------------------------------------------------------------

/// Direct-pipe state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PipePhase {
    /// Forwarding stdout chunks
    Streaming,
    /// stdout hit EOF, waiting for exit status
    Draining,
    Done,
    Failed,
}

/// Resources a piped job keeps alive until its stream ends.
pub struct PipeResources {
    pub permit: Option<OwnedSemaphorePermit>,
    pub credentials: Option<CredentialArtifact>,
}

struct DirectPipe {
    job_id: String,
    platform: Platform,
    phase: PipePhase,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr_task: Option<JoinHandle<String>>,
    chunk_size: usize,
    drain_timeout: Duration,
    sent: u64,
    resources: PipeResources,
}

impl DirectPipe {
    fn enter(&mut self, phase: PipePhase) {
        log::debug!("🔀 Job {}: pipe {} -> {}", self.job_id, self.phase, phase);
        self.phase = phase;
    }

    fn release(&mut self) {
        self.stdout = None;
        if let Some(credentials) = self.resources.credentials.take() {
            credentials.release();
        }
        self.resources.permit = None;
    }

    async fn next_chunk(&mut self) -> Option<Result<Bytes, DownloadError>> {
        loop {
            match self.phase {
                PipePhase::Streaming => {
                    let stdout = match self.stdout.as_mut() {
                        Some(stdout) => stdout,
                        None => {
                            self.enter(PipePhase::Draining);
                            continue;
                        }
                    };
                    let mut buf = BytesMut::with_capacity(self.chunk_size);
                    match stdout.read_buf(&mut buf).await {
                        Ok(0) => {
                            self.stdout = None;
                            self.enter(PipePhase::Draining);
                        }
                        Ok(n) => {
                            self.sent += n as u64;
                            return Some(Ok(buf.freeze()));
                        }
                        Err(e) => {
                            log::error!("❌ Job {}: pipe read failed after {} bytes: {}", self.job_id, self.sent, e);
                            self.kill().await;
                            self.enter(PipePhase::Failed);
                            self.release();
                            return Some(Err(DownloadError::StreamingAborted(e.to_string())));
                        }
                    }
                }
                PipePhase::Draining => {
                    let outcome = self.drain().await;
                    self.release();
                    return match outcome {
                        Ok(()) => {
                            self.enter(PipePhase::Done);
                            log::info!("✅ Job {}: piped {} bytes", self.job_id, self.sent);
                            None
                        }
                        Err(e) => {
                            self.enter(PipePhase::Failed);
                            Some(Err(e))
                        }
                    };
                }
                PipePhase::Done | PipePhase::Failed => return None,
            }
        }
    }

    /// Waits for the exit status, then inspects the collected stderr.
    async fn drain(&mut self) -> Result<(), DownloadError> {
        let Some(mut child) = self.child.take() else {
            return Err(DownloadError::ExtractionFailed("extractor process missing".into()));
        };
        let status = match tokio::time::timeout(self.drain_timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                let _ = child.kill().await;
                return Err(DownloadError::ExtractionFailed(format!("waiting for extractor failed: {}", e)));
            }
            Err(_) => {
                log::error!("❌ Job {}: extractor did not exit after stdout closed, killing", self.job_id);
                let _ = child.kill().await;
                return Err(DownloadError::ExtractionFailed(format!(
                    "{} transfer did not finish in time",
                    self.platform.label()
                )));
            }
        };

        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            log::error!(
                "❌ Job {}: extractor exited with {:?} after {} bytes",
                self.job_id,
                status.code(),
                self.sent
            );
            return Err(ytdlp_errors::classify(&stderr, self.platform));
        }
        if self.sent == 0 {
            return Err(DownloadError::IncompleteOutput(format!(
                "{} produced no data",
                self.platform.label()
            )));
        }
        Ok(())
    }

    async fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}

impl Drop for DirectPipe {
    fn drop(&mut self) {
        if matches!(self.phase, PipePhase::Streaming | PipePhase::Draining) {
            log::warn!(
                "⚠️ Job {}: consumer disconnected after {} bytes, terminating extractor",
                self.job_id,
                self.sent
            );
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        if let Some(mut child) = self.child.take() {
            // Kill now, reap on the runtime when one is available
            let _ = child.start_kill();
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = child.wait().await;
                });
            }
        }
        self.release();
    }
}

/// Collects a bounded tail of stderr in the background.
fn collect_stderr(stderr: ChildStderr, job_id: String) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut tail: VecDeque<String> = VecDeque::new();
        while let Ok(Some(line)) = lines.next_line().await {
            log::debug!("yt-dlp[{}] stderr: {}", job_id, line);
            tail.push_back(line);
            if tail.len() > config::download::STDERR_TAIL_LINES {
                tail.pop_front();
            }
        }
        tail.into_iter().collect::<Vec<_>>().join("\n")
    })
}

/// Options of one piped transfer.
pub struct PipeSettings {
    pub job_id: String,
    pub platform: Platform,
    pub chunk_size: usize,
    pub drain_timeout: Duration,
}

/// Streams a spawned extractor's stdout. The child must have piped stdout and stderr.
pub fn direct_pipe(mut child: Child, settings: PipeSettings, resources: PipeResources) -> ByteStream {
    let stdout = child.stdout.take();
    let stderr_task = child
        .stderr
        .take()
        .map(|stderr| collect_stderr(stderr, settings.job_id.clone()));

    let state = DirectPipe {
        job_id: settings.job_id,
        platform: settings.platform,
        phase: PipePhase::Streaming,
        child: Some(child),
        stdout,
        stderr_task,
        chunk_size: settings.chunk_size.max(1),
        drain_timeout: settings.drain_timeout,
        sent: 0,
        resources,
    };
    Box::pin(stream::unfold(state, |mut state| async move {
        let item = state.next_chunk().await?;
        Some((item, state))
    }))
}
