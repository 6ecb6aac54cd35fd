//! Authentication material translator.
//!
//! Turns the raw `Cookie` header a caller captured from a signed-in browser
//! (plus cookies embedded in auth metadata) into a Netscape cookie jar that
//! yt-dlp can consume, scoped to the platform's authentication domains.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::core::config;
use crate::download::error::DownloadError;
use crate::download::platform::PlatformProfile;
use crate::download::scratch::unique_stem;
use crate::download::types::AuthMetadata;

const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File\n# Generated by ufd for a single request. Do not edit.\n\n";

const SECONDS_PER_DAY: i64 = 86_400;

/// One line of a Netscape cookie jar.
#[derive(Clone, PartialEq, Eq)]
pub struct CookieRecord {
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    /// Unix timestamp
    pub expires: i64,
    pub name: String,
    pub value: String,
}

impl CookieRecord {
    /// Masked value for diagnostics, e.g. `abcd...wxyz`.
    pub fn masked_value(&self) -> String {
        let chars: Vec<char> = self.value.chars().collect();
        if chars.len() <= 8 {
            "*".repeat(chars.len())
        } else {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}...{}", head, tail)
        }
    }

    fn to_netscape_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.domain,
            bool_field(self.include_subdomains),
            self.path,
            bool_field(self.secure),
            self.expires,
            self.name,
            self.value
        )
    }
}

impl std::fmt::Debug for CookieRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieRecord")
            .field("domain", &self.domain)
            .field("name", &self.name)
            .field("secure", &self.secure)
            .field("expires", &self.expires)
            .field("value", &self.masked_value())
            .finish()
    }
}

fn bool_field(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// A cookie file handed to yt-dlp via `--cookies`.
///
/// Generated artifacts are deleted exactly once, on [`release`](Self::release)
/// or drop. Provisioned files belong to the deployment and are never deleted.
#[derive(Debug)]
pub struct CredentialArtifact {
    path: Option<PathBuf>,
    provisioned: bool,
}

impl CredentialArtifact {
    fn generated(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            provisioned: false,
        }
    }

    /// Wraps a pre-provisioned cookie file owned by the deployment.
    pub fn provisioned(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            provisioned: true,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_provisioned(&self) -> bool {
        self.provisioned
    }

    /// Deletes the artifact now instead of at drop.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        if self.provisioned {
            return;
        }
        match fs::remove_file(&path) {
            Ok(()) => log::debug!("🧹 Removed credential artifact {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove credential artifact {}: {}", path.display(), e),
        }
    }
}

impl Drop for CredentialArtifact {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Splits a `Cookie` header into `(name, value)` pairs.
///
/// Pairs without `=`, with an empty name or value, or with characters that would
/// corrupt a Netscape line are skipped. Values may contain `=`.
pub fn parse_cookie_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter_map(|part| {
            let (name, value) = part.trim().split_once('=')?;
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() || value.is_empty() {
                return None;
            }
            if name.chars().chain(value.chars()).any(|c| c.is_control()) {
                return None;
            }
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// Merges request cookies with metadata cookies; a later name overrides in place.
fn merge_pairs(raw: Option<&str>, metadata: Option<&AuthMetadata>) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = Vec::new();
    let sources = raw
        .into_iter()
        .chain(metadata.and_then(AuthMetadata::cookie_field));
    for (name, value) in sources.flat_map(parse_cookie_pairs) {
        match merged.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => merged.push((name, value)),
        }
    }
    merged
}

/// Expiry shared by every record issued on the same UTC day.
pub fn credential_expiry(issued_at: DateTime<Utc>) -> i64 {
    let ts = issued_at.timestamp();
    let day_start = ts - ts.rem_euclid(SECONDS_PER_DAY);
    day_start + config::download::CREDENTIAL_TTL_DAYS * SECONDS_PER_DAY
}

/// Builds the jar records: one per valid pair per authentication domain.
pub fn build_records(
    raw: Option<&str>,
    metadata: Option<&AuthMetadata>,
    profile: &PlatformProfile,
    issued_at: DateTime<Utc>,
) -> Vec<CookieRecord> {
    let expires = credential_expiry(issued_at);
    let pairs = merge_pairs(raw, metadata);
    let mut records = Vec::with_capacity(pairs.len() * profile.auth_domains.len());

    for (name, value) in &pairs {
        let critical = profile.is_critical_cookie(name);
        if critical {
            log::info!("🔐 {} session cookie present: {}", profile.platform, name);
        } else {
            log::debug!("🍪 {} cookie: {}", profile.platform, name);
        }
        let secure = critical || profile.cookies_secure_by_default;

        for domain in profile.auth_domains {
            records.push(CookieRecord {
                domain: (*domain).to_string(),
                include_subdomains: domain.starts_with('.'),
                path: "/".to_string(),
                secure,
                expires,
                name: name.clone(),
                value: value.clone(),
            });
        }
    }
    records
}

/// Renders records as Netscape cookie file contents.
pub fn to_netscape(records: &[CookieRecord]) -> String {
    let mut out = String::from(NETSCAPE_HEADER);
    for record in records {
        out.push_str(&record.to_netscape_line());
        out.push('\n');
    }
    out
}

/// Translates request cookies into a credential artifact in `scratch_dir`.
///
/// Returns `Ok(None)` when there is nothing usable to write. A write failure is
/// `CredentialWrite`, which callers treat as soft.
pub fn translate(
    raw: Option<&str>,
    metadata: Option<&AuthMetadata>,
    profile: &PlatformProfile,
    scratch_dir: &Path,
) -> Result<Option<CredentialArtifact>, DownloadError> {
    let raw = raw.filter(|r| !r.trim().is_empty());
    if raw.is_none() && metadata.and_then(AuthMetadata::cookie_field).is_none() {
        return Ok(None);
    }

    let records = build_records(raw, metadata, profile, Utc::now());
    if records.is_empty() {
        log::warn!("⚠️ Cookies supplied for {} but none were usable", profile.platform);
        return Ok(None);
    }

    let path = scratch_dir.join(format!("{}.txt", unique_stem(&format!("cookies_{}", profile.platform))));
    write_private(&path, &to_netscape(&records)).map_err(|e| {
        let _ = fs::remove_file(&path);
        DownloadError::CredentialWrite(format!("{}: {}", scratch_dir.display(), e))
    })?;

    log::info!(
        "🍪 Wrote {} cookie record(s) for {} to {}",
        records.len(),
        profile.platform,
        path.display()
    );
    Ok(Some(CredentialArtifact::generated(path)))
}

fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}
