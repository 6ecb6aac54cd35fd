//! Platform adapter registry.
//!
//! One immutable [`PlatformProfile`] per [`Platform`] variant describing how requests
//! to that platform must be shaped: browser-like headers, origin/referer, which cookie
//! domains authentication applies to, extractor hints and request pacing.
//! Lookup is an exhaustive `match`, so adding a platform without a profile does not compile.

use crate::core::config::pacing;
use crate::download::error::DownloadError;
use crate::download::types::Platform;

/// Desktop Chrome user agent sent to every platform
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

/// Headers shared by all profiles, in send order
const COMMON_HEADERS: &[(&str, &str)] = &[
    ("User-Agent", USER_AGENT),
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.9"),
    ("Accept-Encoding", "gzip, deflate, br"),
];

/// Retry and sleep schedule handed to the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pacing {
    pub retries: u32,
    pub fragment_retries: u32,
    pub extractor_retries: Option<u32>,
    /// yt-dlp `--retry-sleep` expression applied to http and fragment retries
    pub retry_sleep: Option<&'static str>,
    /// Seconds between extraction requests
    pub sleep_requests: Option<u32>,
    /// (min, max) seconds before each download
    pub sleep_interval: Option<(u32, u32)>,
}

/// Request-shaping profile of one platform.
#[derive(Debug, PartialEq, Eq)]
pub struct PlatformProfile {
    pub platform: Platform,
    pub origin: &'static str,
    pub referer: &'static str,
    /// Cookie domains, most specific first
    pub auth_domains: &'static [&'static str],
    /// Session/identity cookie names that are always marked secure
    pub critical_cookies: &'static [&'static str],
    /// Secure flag for cookies that are not critical
    pub cookies_secure_by_default: bool,
    /// Whether content commonly needs a signed-in session
    pub cookies_expected: bool,
    /// yt-dlp extractor key the hints apply to
    pub extractor_key: &'static str,
    /// Opaque `key=value` hints passed through `--extractor-args`
    pub extractor_hints: &'static [(&'static str, &'static str)],
    pub pacing: Pacing,
    /// Production variant: transient failures get one simplified retry
    pub fallback_eligible: bool,
    /// Production variant: fall back to the pre-provisioned cookie file
    pub prod_provisioned_cookies: bool,
    /// Development variant: fall back to the local browser profile
    pub dev_browser_cookies: bool,
}

impl PlatformProfile {
    /// Full ordered header list: common headers, then Origin and Referer.
    pub fn headers(&self) -> Vec<(&'static str, &'static str)> {
        let mut headers = COMMON_HEADERS.to_vec();
        headers.push(("Origin", self.origin));
        headers.push(("Referer", self.referer));
        headers
    }

    /// Rendered `--extractor-args` value, e.g. `youtube:player_client=android,web`.
    pub fn extractor_args(&self) -> Option<String> {
        if self.extractor_hints.is_empty() {
            return None;
        }
        let joined = self
            .extractor_hints
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(";");
        Some(format!("{}:{}", self.extractor_key, joined))
    }

    /// Whether a cookie with this name gets the secure flag unconditionally.
    pub fn is_critical_cookie(&self, name: &str) -> bool {
        name.starts_with("__Secure-") || name.starts_with("__Host-") || self.critical_cookies.contains(&name)
    }
}

const STANDARD_PACING: Pacing = Pacing {
    retries: pacing::RETRIES,
    fragment_retries: pacing::FRAGMENT_RETRIES,
    extractor_retries: None,
    retry_sleep: None,
    sleep_requests: None,
    sleep_interval: None,
};

static YOUTUBE: PlatformProfile = PlatformProfile {
    platform: Platform::Youtube,
    origin: "https://www.youtube.com",
    referer: "https://www.youtube.com/",
    auth_domains: &[".youtube.com", ".google.com"],
    critical_cookies: &["SID", "HSID", "SSID", "APISID", "SAPISID", "LOGIN_INFO"],
    cookies_secure_by_default: false,
    cookies_expected: true,
    extractor_key: "youtube",
    extractor_hints: &[("player_client", "android,web"), ("player_skip", "configs"), ("max_comments", "0")],
    pacing: Pacing {
        retries: 15,
        fragment_retries: pacing::FRAGMENT_RETRIES,
        extractor_retries: Some(3),
        retry_sleep: Some("exp=1:30"),
        sleep_requests: Some(pacing::SLEEP_REQUESTS_SECS),
        sleep_interval: Some((pacing::SLEEP_INTERVAL_SECS, pacing::MAX_SLEEP_INTERVAL_SECS)),
    },
    fallback_eligible: true,
    prod_provisioned_cookies: true,
    dev_browser_cookies: true,
};

static FACEBOOK: PlatformProfile = PlatformProfile {
    platform: Platform::Facebook,
    origin: "https://www.facebook.com",
    referer: "https://www.facebook.com/",
    auth_domains: &[".facebook.com", ".fb.com"],
    critical_cookies: &["c_user", "xs"],
    cookies_secure_by_default: true,
    cookies_expected: true,
    extractor_key: "facebook",
    extractor_hints: &[],
    pacing: STANDARD_PACING,
    fallback_eligible: true,
    prod_provisioned_cookies: false,
    dev_browser_cookies: true,
};

static TWITTER: PlatformProfile = PlatformProfile {
    platform: Platform::Twitter,
    origin: "https://twitter.com",
    referer: "https://twitter.com/",
    auth_domains: &[".x.com", ".twitter.com"],
    critical_cookies: &["auth_token", "ct0", "twid"],
    cookies_secure_by_default: true,
    cookies_expected: false,
    extractor_key: "twitter",
    extractor_hints: &[],
    pacing: STANDARD_PACING,
    fallback_eligible: true,
    prod_provisioned_cookies: false,
    dev_browser_cookies: false,
};

static INSTAGRAM: PlatformProfile = PlatformProfile {
    platform: Platform::Instagram,
    origin: "https://www.instagram.com",
    referer: "https://www.instagram.com/",
    auth_domains: &[".instagram.com"],
    critical_cookies: &["sessionid", "ds_user_id", "csrftoken"],
    cookies_secure_by_default: true,
    cookies_expected: true,
    extractor_key: "instagram",
    extractor_hints: &[],
    pacing: STANDARD_PACING,
    fallback_eligible: true,
    prod_provisioned_cookies: false,
    dev_browser_cookies: true,
};

static TIKTOK: PlatformProfile = PlatformProfile {
    platform: Platform::Tiktok,
    origin: "https://www.tiktok.com",
    referer: "https://www.tiktok.com/",
    auth_domains: &[".tiktok.com"],
    critical_cookies: &["sessionid", "sid_tt", "sid_guard"],
    cookies_secure_by_default: false,
    cookies_expected: false,
    extractor_key: "tiktok",
    extractor_hints: &[],
    pacing: STANDARD_PACING,
    fallback_eligible: true,
    prod_provisioned_cookies: false,
    dev_browser_cookies: false,
};

static REDDIT: PlatformProfile = PlatformProfile {
    platform: Platform::Reddit,
    origin: "https://www.reddit.com",
    referer: "https://www.reddit.com/",
    auth_domains: &[".reddit.com"],
    critical_cookies: &["reddit_session", "token_v2"],
    cookies_secure_by_default: false,
    cookies_expected: false,
    extractor_key: "reddit",
    extractor_hints: &[],
    pacing: STANDARD_PACING,
    fallback_eligible: false,
    prod_provisioned_cookies: false,
    dev_browser_cookies: false,
};

/// Profile for a platform.
pub fn profile_for(platform: Platform) -> &'static PlatformProfile {
    match platform {
        Platform::Youtube => &YOUTUBE,
        Platform::Facebook => &FACEBOOK,
        Platform::Twitter => &TWITTER,
        Platform::Instagram => &INSTAGRAM,
        Platform::Tiktok => &TIKTOK,
        Platform::Reddit => &REDDIT,
    }
}

/// Profile for a raw platform identifier; unknown identifiers are `UnsupportedPlatform`.
pub fn lookup(id: &str) -> Result<&'static PlatformProfile, DownloadError> {
    id.trim()
        .parse::<Platform>()
        .map(profile_for)
        .map_err(|_| DownloadError::UnsupportedPlatform(id.to_string()))
}
