//! Outbound option bag for one extractor invocation, rendered to yt-dlp arguments.

use std::path::PathBuf;

use crate::core::config::{download, pacing};
use crate::download::platform::PlatformProfile;
use crate::download::types::MediaFormat;

/// Where yt-dlp reads cookies from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieSource {
    /// Netscape cookie file (generated artifact or provisioned file)
    File(PathBuf),
    /// Local browser profile, development only
    Browser(String),
}

/// What the invocation produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Print metadata JSON, download nothing (`-J`)
    Inspect,
    /// Download to an output template in the scratch directory
    File(String),
    /// Write media bytes to stdout (`-o -`)
    Stdout,
}

/// Attempt tier within one job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Primary,
    Fallback,
}

/// Every knob one yt-dlp invocation is run with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOptions {
    pub url: String,
    pub attempt: Attempt,
    pub output: OutputTarget,
    pub format_selector: Option<String>,
    pub media_format: MediaFormat,
    /// Request headers other than Referer
    pub headers: Vec<(String, String)>,
    pub referer: Option<String>,
    pub check_certificates: bool,
    pub retries: u32,
    pub fragment_retries: u32,
    pub extractor_retries: Option<u32>,
    pub retry_sleep: Option<String>,
    pub sleep_requests: Option<u32>,
    pub sleep_interval: Option<(u32, u32)>,
    pub extractor_args: Option<String>,
    pub cookies: Option<CookieSource>,
    pub socket_timeout: u32,
}

impl ExtractionOptions {
    /// Primary option set: profile headers, pacing and hints plus the given selection.
    pub fn primary(
        url: &str,
        profile: &PlatformProfile,
        media_format: MediaFormat,
        format_selector: Option<String>,
        output: OutputTarget,
        cookies: Option<CookieSource>,
    ) -> Self {
        let headers = profile
            .headers()
            .into_iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("Referer"))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        Self {
            url: url.to_string(),
            attempt: Attempt::Primary,
            output,
            format_selector,
            media_format,
            headers,
            referer: Some(profile.referer.to_string()),
            check_certificates: true,
            retries: profile.pacing.retries,
            fragment_retries: profile.pacing.fragment_retries,
            extractor_retries: profile.pacing.extractor_retries,
            retry_sleep: profile.pacing.retry_sleep.map(str::to_string),
            sleep_requests: profile.pacing.sleep_requests,
            sleep_interval: profile.pacing.sleep_interval,
            extractor_args: profile.extractor_args(),
            cookies,
            socket_timeout: download::SOCKET_TIMEOUT_SECS,
        }
    }

    /// Simplified second attempt: loose selector, no certificate checks,
    /// no client hints, wider retries and slower pacing. Cookies and output are kept.
    #[must_use]
    pub fn into_fallback(self, loose_selector: String) -> Self {
        Self {
            attempt: Attempt::Fallback,
            format_selector: Some(loose_selector),
            check_certificates: false,
            retries: pacing::FALLBACK_RETRIES,
            fragment_retries: pacing::FALLBACK_FRAGMENT_RETRIES,
            extractor_retries: Some(pacing::FALLBACK_EXTRACTOR_RETRIES),
            retry_sleep: Some("exp=2:60".to_string()),
            sleep_requests: Some(pacing::SLEEP_REQUESTS_SECS),
            sleep_interval: Some((pacing::SLEEP_INTERVAL_SECS * 2, pacing::MAX_SLEEP_INTERVAL_SECS * 2)),
            extractor_args: None,
            ..self
        }
    }

    /// Renders the argument vector, URL last.
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = Vec::with_capacity(48);
        let mut push = |flag: &str, value: String| {
            args.push(flag.to_string());
            args.push(value);
        };

        match &self.output {
            OutputTarget::Inspect => {}
            OutputTarget::File(template) => push("-o", template.clone()),
            OutputTarget::Stdout => push("-o", "-".to_string()),
        }
        if let Some(selector) = &self.format_selector {
            push("--format", selector.clone());
        }
        if let OutputTarget::File(_) = self.output {
            match self.media_format {
                MediaFormat::Video => push("--merge-output-format", "mp4".to_string()),
                MediaFormat::Audio => push("--audio-format", "mp3".to_string()),
            }
        }
        for (name, value) in &self.headers {
            push("--add-header", format!("{}:{}", name, value));
        }
        if let Some(referer) = &self.referer {
            push("--referer", referer.clone());
        }
        push("--retries", self.retries.to_string());
        push("--fragment-retries", self.fragment_retries.to_string());
        if let Some(n) = self.extractor_retries {
            push("--extractor-retries", n.to_string());
        }
        if let Some(expr) = &self.retry_sleep {
            push("--retry-sleep", format!("http:{}", expr));
            push("--retry-sleep", format!("fragment:{}", expr));
        }
        if let Some(secs) = self.sleep_requests {
            push("--sleep-requests", secs.to_string());
        }
        if let Some((min, max)) = self.sleep_interval {
            push("--sleep-interval", min.to_string());
            push("--max-sleep-interval", max.to_string());
        }
        if let Some(extractor_args) = &self.extractor_args {
            push("--extractor-args", extractor_args.clone());
        }
        match &self.cookies {
            Some(CookieSource::File(path)) => push("--cookies", path.to_string_lossy().into_owned()),
            Some(CookieSource::Browser(browser)) => push("--cookies-from-browser", browser.clone()),
            None => {}
        }
        push("--socket-timeout", self.socket_timeout.to_string());

        if self.output == OutputTarget::Inspect {
            args.push("-J".to_string());
        }
        if let OutputTarget::File(_) = self.output {
            if self.media_format == MediaFormat::Audio {
                args.push("--extract-audio".to_string());
            }
            args.push("--force-overwrites".to_string());
        }
        if !self.check_certificates {
            args.push("--no-check-certificates".to_string());
        }
        args.push("--no-playlist".to_string());
        args.push("--no-progress".to_string());
        args.push(self.url.clone());
        args
    }

    /// Arguments safe to log: header values and cookie paths are left out.
    pub fn describe(&self) -> String {
        format!(
            "{:?} {} format={} cookies={} hints={}",
            self.attempt,
            match &self.output {
                OutputTarget::Inspect => "inspect",
                OutputTarget::File(_) => "file",
                OutputTarget::Stdout => "stdout",
            },
            self.format_selector.as_deref().unwrap_or("-"),
            match &self.cookies {
                Some(CookieSource::File(_)) => "file",
                Some(CookieSource::Browser(_)) => "browser",
                None => "none",
            },
            self.extractor_args.as_deref().unwrap_or("-"),
        )
    }
}
