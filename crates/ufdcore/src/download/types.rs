//! Request and result types shared by every stage of the retrieval pipeline.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use url::Url;

use crate::download::error::DownloadError;

/// Supported content platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Platform {
    Youtube,
    Facebook,
    Twitter,
    Instagram,
    Tiktok,
    Reddit,
}

impl Platform {
    /// Human-facing name for messages
    pub fn label(self) -> &'static str {
        match self {
            Platform::Youtube => "YouTube",
            Platform::Facebook => "Facebook",
            Platform::Twitter => "X (Twitter)",
            Platform::Instagram => "Instagram",
            Platform::Tiktok => "TikTok",
            Platform::Reddit => "Reddit",
        }
    }
}

/// Requested media format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MediaFormat {
    Video,
    Audio,
}

/// Requested quality tier (video only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum Quality {
    #[strum(to_string = "highest", serialize = "best")]
    Highest,
    #[strum(to_string = "1080p")]
    Hd1080,
    #[strum(to_string = "720p")]
    Hd720,
    #[strum(to_string = "480p")]
    Sd480,
    #[strum(to_string = "360p")]
    Sd360,
}

impl Quality {
    /// Height ceiling in pixels, `None` for `Highest`.
    pub fn max_height(self) -> Option<u32> {
        match self {
            Quality::Highest => None,
            Quality::Hd1080 => Some(1080),
            Quality::Hd720 => Some(720),
            Quality::Sd480 => Some(480),
            Quality::Sd360 => Some(360),
        }
    }
}

/// Production vs development request shaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum DeploymentMode {
    #[strum(to_string = "production", serialize = "prod")]
    Production,
    #[strum(to_string = "development", serialize = "dev")]
    Development,
}

/// How retrieved bytes reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum DeliveryMode {
    /// Download to a verified temp file, then relay it in chunks
    #[strum(to_string = "file", serialize = "file-relay")]
    FileRelay,
    /// Stream the extractor's stdout directly
    #[strum(to_string = "pipe", serialize = "direct-pipe")]
    DirectPipe,
}

/// Structured authentication metadata sent alongside a request.
///
/// Opaque key/value pairs; only the embedded cookie field is interpreted.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthMetadata(BTreeMap<String, String>);

impl AuthMetadata {
    /// Keys that may carry an embedded cookie string
    const COOKIE_KEYS: &'static [&'static str] = &["cookie", "cookies"];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Embedded cookie string, if the metadata carries a non-blank one.
    pub fn cookie_field(&self) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, v)| Self::COOKIE_KEYS.contains(&k.to_ascii_lowercase().as_str()) && !v.trim().is_empty())
            .map(|(_, v)| v.as_str())
    }
}

impl FromIterator<(String, String)> for AuthMetadata {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// Values may be credentials; only keys are printed.
impl fmt::Debug for AuthMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// One caller request. Immutable once built.
#[derive(Clone)]
pub struct RetrievalRequest {
    url: Url,
    platform: Platform,
    format: MediaFormat,
    quality: Option<Quality>,
    cookies: Option<String>,
    auth_metadata: Option<AuthMetadata>,
}

impl RetrievalRequest {
    pub fn new(url: Url, platform: Platform, format: MediaFormat, quality: Option<Quality>) -> Self {
        Self {
            url,
            platform,
            format,
            quality,
            cookies: None,
            auth_metadata: None,
        }
    }

    /// Builds a request from the raw identifiers an inbound layer receives.
    ///
    /// Unknown platforms map to `UnsupportedPlatform`, unknown format or quality
    /// identifiers to `InvalidFormatQuality`, malformed or non-http(s) URLs to `InvalidUrl`.
    pub fn parse(url: &str, platform: &str, format: &str, quality: Option<&str>) -> Result<Self, DownloadError> {
        let platform: Platform = platform
            .trim()
            .parse()
            .map_err(|_| DownloadError::UnsupportedPlatform(platform.to_string()))?;
        let format: MediaFormat = format
            .trim()
            .parse()
            .map_err(|_| DownloadError::InvalidFormatQuality(format!("unknown format '{}'", format)))?;
        let quality = match quality.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => Some(
                q.parse::<Quality>()
                    .map_err(|_| DownloadError::InvalidFormatQuality(format!("unknown quality '{}'", q)))?,
            ),
            None => None,
        };
        let url = parse_media_url(url)?;
        Ok(Self::new(url, platform, format, quality))
    }

    /// Attaches a raw `Cookie` header value.
    #[must_use]
    pub fn with_cookies(mut self, raw: impl Into<String>) -> Self {
        self.cookies = Some(raw.into());
        self
    }

    /// Attaches structured authentication metadata.
    #[must_use]
    pub fn with_auth_metadata(mut self, metadata: AuthMetadata) -> Self {
        self.auth_metadata = Some(metadata);
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }

    /// Quality as relevant to selection: always `None` for audio.
    pub fn quality(&self) -> Option<Quality> {
        match self.format {
            MediaFormat::Audio => None,
            MediaFormat::Video => self.quality,
        }
    }

    pub fn cookies(&self) -> Option<&str> {
        self.cookies.as_deref()
    }

    pub fn auth_metadata(&self) -> Option<&AuthMetadata> {
        self.auth_metadata.as_ref()
    }
}

impl fmt::Debug for RetrievalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievalRequest")
            .field("url", &self.url.as_str())
            .field("platform", &self.platform)
            .field("format", &self.format)
            .field("quality", &self.quality)
            .field("cookies", &self.cookies.as_ref().map(|_| "<redacted>"))
            .field("auth_metadata", &self.auth_metadata)
            .finish()
    }
}

/// Parses and validates a media URL (http/https only).
pub fn parse_media_url(raw: &str) -> Result<Url, DownloadError> {
    let url = Url::parse(raw.trim()).map_err(|e| DownloadError::InvalidUrl(format!("{}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(DownloadError::InvalidUrl(format!("unsupported scheme '{}'", other))),
    }
}

/// Kind of a stream listed in [`MediaInfo::formats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Video,
    Audio,
}

/// One available stream, as reported by the metadata probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatEntry {
    /// "720p" for video streams, "audio" for audio-only streams
    pub quality: String,
    pub kind: FormatKind,
    /// Human readable size, e.g. "12MB"
    pub size: Option<String>,
}

/// Result of the inspect-only probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaInfo {
    pub title: String,
    pub thumbnail: Option<String>,
    /// Duration in whole seconds
    pub duration: Option<u64>,
    pub formats: Vec<FormatEntry>,
}
