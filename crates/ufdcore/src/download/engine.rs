//! Concurrency-bounded extraction engine.
//!
//! Every request becomes a job that moves through
//! `Queued → Admitted → ProbingMetadata → Retrieving → Succeeded`, with
//! `FailedPrimary → Retrying` in between when the fallback ladder applies.
//! Admission is a FIFO semaphore owned by the engine instance.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use strum::Display;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use crate::core::config;
use crate::core::utils::escape_filename;
use crate::download::cookies::{self, CredentialArtifact};
use crate::download::delivery::{self, content_type_for, MediaDelivery, PipeResources, PipeSettings};
use crate::download::error::DownloadError;
use crate::download::extractor::Extractor;
use crate::download::format::{select_fallback_format, select_format, select_progressive_format};
use crate::download::options::{CookieSource, ExtractionOptions, OutputTarget};
use crate::download::platform::{profile_for, PlatformProfile};
use crate::download::scratch::{find_output, ScratchFiles};
use crate::download::types::{DeliveryMode, DeploymentMode, MediaFormat, MediaInfo, RetrievalRequest};

/// Snapshot of everything the engine is configured with.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_concurrent: usize,
    pub scratch_dir: PathBuf,
    pub deployment: DeploymentMode,
    pub delivery: DeliveryMode,
    /// Provisioned cookie file used in production when a request has none
    pub provisioned_cookies: Option<PathBuf>,
    /// Browser to read cookies from in development when a request has none
    pub cookies_browser: Option<String>,
    pub chunk_size: usize,
    pub probe_timeout: Duration,
    pub retrieve_timeout: Duration,
    pub drain_timeout: Duration,
}

impl EngineSettings {
    /// Defaults rooted at `scratch_dir`, independent of the environment.
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            max_concurrent: config::queue::DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            scratch_dir: scratch_dir.into(),
            deployment: DeploymentMode::Development,
            delivery: DeliveryMode::FileRelay,
            provisioned_cookies: None,
            cookies_browser: None,
            chunk_size: config::download::CHUNK_SIZE,
            probe_timeout: config::download::probe_timeout(),
            retrieve_timeout: config::download::ytdlp_timeout(),
            drain_timeout: config::download::drain_timeout(),
        }
    }

    /// Settings read from the environment through [`config`].
    pub fn from_env() -> Self {
        let browser = config::YTDL_COOKIES_BROWSER.trim();
        Self {
            max_concurrent: *config::queue::MAX_CONCURRENT_DOWNLOADS,
            deployment: *config::DEPLOYMENT_MODE,
            delivery: *config::DELIVERY_MODE,
            provisioned_cookies: config::YTDL_COOKIES_FILE
                .as_deref()
                .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned())),
            cookies_browser: (!browser.is_empty()).then(|| browser.to_string()),
            ..Self::new((*config::SCRATCH_DIR).clone())
        }
    }

    #[must_use]
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n.max(1);
        self
    }

    #[must_use]
    pub fn with_deployment(mut self, mode: DeploymentMode) -> Self {
        self.deployment = mode;
        self
    }

    #[must_use]
    pub fn with_delivery(mut self, mode: DeliveryMode) -> Self {
        self.delivery = mode;
        self
    }

    #[must_use]
    pub fn with_provisioned_cookies(mut self, path: impl Into<PathBuf>) -> Self {
        self.provisioned_cookies = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_cookies_browser(mut self, browser: impl Into<String>) -> Self {
        self.cookies_browser = Some(browser.into());
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, probe: Duration, retrieve: Duration, drain: Duration) -> Self {
        self.probe_timeout = probe;
        self.retrieve_timeout = retrieve;
        self.drain_timeout = drain;
        self
    }
}

/// Lifecycle of one job, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum JobState {
    Queued,
    Admitted,
    ProbingMetadata,
    Retrieving,
    FailedPrimary,
    Retrying,
    Succeeded,
    Failed,
}

struct RetrievalJob {
    id: String,
    state: JobState,
    attempts: u8,
    profile: &'static PlatformProfile,
}

impl RetrievalJob {
    fn new(request: &RetrievalRequest) -> Self {
        let id = Uuid::new_v4().simple().to_string()[..8].to_string();
        let job = Self {
            id,
            state: JobState::Queued,
            attempts: 0,
            profile: profile_for(request.platform()),
        };
        log::info!(
            "📥 Job {} queued: {} {} {:?} from {}",
            job.id,
            request.platform(),
            request.format(),
            request.quality(),
            request.url()
        );
        job
    }

    fn transition(&mut self, next: JobState) {
        log::info!("🔄 Job {}: {} -> {}", self.id, self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: DownloadError) -> DownloadError {
        self.transition(JobState::Failed);
        log::warn!("❌ Job {} failed ({}): {}", self.id, err.kind(), err);
        err
    }
}

/// Credentials resolved for one job.
struct JobCredentials {
    /// Keeps a generated artifact alive; deleted when dropped
    artifact: Option<CredentialArtifact>,
    source: Option<CookieSource>,
}

/// The orchestration engine. Cheap to share behind an `Arc`.
pub struct Engine {
    settings: EngineSettings,
    extractor: Arc<dyn Extractor>,
    permits: Arc<Semaphore>,
}

impl Engine {
    pub fn new(settings: EngineSettings, extractor: Arc<dyn Extractor>) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));
        log::info!(
            "⚙️ Engine ready: backend={}, slots={}, deployment={}, delivery={}, scratch={}",
            extractor.name(),
            settings.max_concurrent.max(1),
            settings.deployment,
            settings.delivery,
            settings.scratch_dir.display()
        );
        Self {
            settings,
            extractor,
            permits,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Admission slots not currently held
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Inspect-only retrieval of metadata.
    pub async fn probe(&self, request: &RetrievalRequest) -> Result<MediaInfo, DownloadError> {
        let mut job = RetrievalJob::new(request);
        let _permit = self.admit(&mut job).await?;
        let credentials = self.resolve_credentials(&job, request);
        let result = self.probe_metadata(&mut job, request, &credentials).await;
        match result {
            Ok(info) => {
                job.transition(JobState::Succeeded);
                Ok(info)
            }
            Err(e) => Err(job.fail(e)),
        }
    }

    /// Full retrieval: probe, retrieve, then hand back a byte stream.
    ///
    /// Request errors surface before a slot is taken. In file-relay mode the slot and
    /// credential artifact are released before this returns; in direct-pipe mode they
    /// live inside the returned stream.
    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<MediaDelivery, DownloadError> {
        let selector = match self.settings.delivery {
            DeliveryMode::FileRelay => select_format(request.format(), request.quality())?,
            DeliveryMode::DirectPipe => select_progressive_format(request.format(), request.quality())?,
        };

        let mut job = RetrievalJob::new(request);
        let permit = self.admit(&mut job).await?;
        let credentials = self.resolve_credentials(&job, request);

        let info = match self.probe_metadata(&mut job, request, &credentials).await {
            Ok(info) => info,
            Err(e) => return Err(job.fail(e)),
        };

        job.transition(JobState::Retrieving);
        let outcome = match self.settings.delivery {
            DeliveryMode::FileRelay => {
                let outcome = self.retrieve_to_file(&mut job, request, selector, &credentials, info).await;
                drop(permit);
                if let Some(artifact) = credentials.artifact {
                    artifact.release();
                }
                outcome
            }
            DeliveryMode::DirectPipe => self.retrieve_to_pipe(&job, request, selector, credentials, permit, info),
        };

        match outcome {
            Ok(delivery) => {
                job.transition(JobState::Succeeded);
                Ok(delivery)
            }
            Err(e) => Err(job.fail(e)),
        }
    }

    async fn admit(&self, job: &mut RetrievalJob) -> Result<OwnedSemaphorePermit, DownloadError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| DownloadError::ExtractionFailed("engine is shutting down".into()))?;
        job.transition(JobState::Admitted);
        Ok(permit)
    }

    /// Request cookies first, then the deployment's fallback source.
    fn resolve_credentials(&self, job: &RetrievalJob, request: &RetrievalRequest) -> JobCredentials {
        let profile = job.profile;
        match cookies::translate(
            request.cookies(),
            request.auth_metadata(),
            profile,
            &self.settings.scratch_dir,
        ) {
            Ok(Some(artifact)) => {
                let source = artifact.path().map(|p| CookieSource::File(p.to_path_buf()));
                return JobCredentials {
                    artifact: Some(artifact),
                    source,
                };
            }
            Ok(None) => {}
            Err(e) => log::warn!("⚠️ Job {}: {}; continuing without cookies", job.id, e),
        }

        let source = match self.settings.deployment {
            DeploymentMode::Production if profile.prod_provisioned_cookies => {
                self.settings.provisioned_cookies.as_deref().and_then(|path| {
                    if path.is_file() {
                        log::info!("🍪 Job {}: using provisioned cookies", job.id);
                        Some(CookieSource::File(path.to_path_buf()))
                    } else {
                        log::warn!("⚠️ Provisioned cookies file not found: {}", path.display());
                        None
                    }
                })
            }
            DeploymentMode::Development if profile.dev_browser_cookies => {
                self.settings.cookies_browser.as_ref().map(|browser| {
                    log::info!("🍪 Job {}: using cookies from browser {}", job.id, browser);
                    CookieSource::Browser(browser.clone())
                })
            }
            _ => None,
        };

        if source.is_none() && profile.cookies_expected {
            log::info!("ℹ️ Job {}: no cookies for {}, some content may require sign-in", job.id, profile.platform);
        }
        JobCredentials { artifact: None, source }
    }

    async fn probe_metadata(
        &self,
        job: &mut RetrievalJob,
        request: &RetrievalRequest,
        credentials: &JobCredentials,
    ) -> Result<MediaInfo, DownloadError> {
        job.transition(JobState::ProbingMetadata);
        let options = ExtractionOptions::primary(
            request.url().as_str(),
            job.profile,
            request.format(),
            None,
            OutputTarget::Inspect,
            credentials.source.clone(),
        );
        let info = self
            .extractor
            .inspect(&options, self.settings.probe_timeout)
            .await
            .map_err(|f| f.into_download_error(request.platform()))?;
        log::info!(
            "🔎 Job {}: \"{}\" ({} formats, {:?}s)",
            job.id,
            info.title,
            info.formats.len(),
            info.duration
        );
        Ok(info)
    }

    fn fallback_allowed(&self, job: &RetrievalJob, err: &DownloadError) -> bool {
        err.is_transient() && self.settings.deployment == DeploymentMode::Production && job.profile.fallback_eligible
    }

    async fn retrieve_to_file(
        &self,
        job: &mut RetrievalJob,
        request: &RetrievalRequest,
        selector: String,
        credentials: &JobCredentials,
        info: MediaInfo,
    ) -> Result<MediaDelivery, DownloadError> {
        let scratch = ScratchFiles::new(&self.settings.scratch_dir, "media");
        let options = ExtractionOptions::primary(
            request.url().as_str(),
            job.profile,
            request.format(),
            Some(selector),
            OutputTarget::File(scratch.output_template()),
            credentials.source.clone(),
        );

        job.attempts += 1;
        if let Err(failure) = self.extractor.retrieve(&options, self.settings.retrieve_timeout).await {
            let err = failure.into_download_error(request.platform());
            if !self.fallback_allowed(job, &err) {
                return Err(err);
            }
            job.transition(JobState::FailedPrimary);
            log::warn!("⚠️ Job {}: primary attempt failed ({}), trying fallback", job.id, err);
            let removed = scratch.purge();
            if removed > 0 {
                log::debug!("🧹 Job {}: removed {} partial file(s)", job.id, removed);
            }

            job.transition(JobState::Retrying);
            job.attempts += 1;
            let fallback = options.into_fallback(select_fallback_format(request.format(), request.quality())?);
            if let Err(failure) = self.extractor.retrieve(&fallback, self.settings.retrieve_timeout).await {
                let detail = failure.into_download_error(request.platform());
                log::warn!("⚠️ Job {}: fallback attempt failed ({})", job.id, detail);
                return Err(DownloadError::ExtractionTransient(err.message().to_string()));
            }
            log::info!("✅ Job {}: fallback attempt succeeded", job.id);
        }

        let (path, size) = verify_output(scratch.dir(), scratch.stem())?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("bin").to_string();
        log::info!(
            "📦 Job {}: output {} ({} bytes, {} attempt(s))",
            job.id,
            path.display(),
            size,
            job.attempts
        );

        Ok(MediaDelivery {
            filename: delivery_filename(&info, &ext),
            content_type: content_type_for(&ext),
            content_length: Some(size),
            stream: delivery::file_relay(&path, scratch, self.settings.chunk_size),
            info,
        })
    }

    fn retrieve_to_pipe(
        &self,
        job: &RetrievalJob,
        request: &RetrievalRequest,
        selector: String,
        credentials: JobCredentials,
        permit: OwnedSemaphorePermit,
        info: MediaInfo,
    ) -> Result<MediaDelivery, DownloadError> {
        let options = ExtractionOptions::primary(
            request.url().as_str(),
            job.profile,
            request.format(),
            Some(selector),
            OutputTarget::Stdout,
            credentials.source.clone(),
        );
        let child = self
            .extractor
            .spawn_pipe(&options)
            .map_err(|f| f.into_download_error(request.platform()))?;

        let ext = match request.format() {
            MediaFormat::Video => "mp4",
            MediaFormat::Audio => "m4a",
        };
        let stream = delivery::direct_pipe(
            child,
            PipeSettings {
                job_id: job.id.clone(),
                platform: request.platform(),
                chunk_size: self.settings.chunk_size,
                drain_timeout: self.settings.drain_timeout,
            },
            PipeResources {
                permit: Some(permit),
                credentials: credentials.artifact,
            },
        );
        Ok(MediaDelivery {
            filename: delivery_filename(&info, ext),
            content_type: content_type_for(ext),
            content_length: None,
            stream,
            info,
        })
    }
}

/// Finds the finished output by stem and returns it with its size.
/// Absent, unreadable or empty output is `IncompleteOutput`.
fn verify_output(dir: &Path, stem: &str) -> Result<(PathBuf, u64), DownloadError> {
    let path = find_output(dir, stem)
        .ok_or_else(|| DownloadError::IncompleteOutput("extractor reported success but wrote no file".into()))?;
    let size = std::fs::metadata(&path)
        .map_err(|e| DownloadError::IncompleteOutput(format!("cannot stat output {}: {}", path.display(), e)))?
        .len();
    if size == 0 {
        return Err(DownloadError::IncompleteOutput(format!(
            "output file is empty: {}",
            path.display()
        )));
    }
    Ok((path, size))
}

fn delivery_filename(info: &MediaInfo, ext: &str) -> String {
    let title = if info.title.trim().is_empty() { "media" } else { info.title.as_str() };
    format!("{}.{}", escape_filename(title), ext)
}
