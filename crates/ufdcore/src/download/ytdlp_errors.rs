//! yt-dlp error analysis
//!
//! Maps yt-dlp stderr to the closed error taxonomy and produces
//! platform-aware messages for the caller and fix hints for the logs.

use crate::download::error::{DownloadError, UnavailableReason};
use crate::download::types::Platform;

/// Kinds of yt-dlp failure recognized from stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YtDlpErrorType {
    /// Sign-in wall, bot check or rejected cookies
    AuthRequired,
    /// Content cannot be served (private, removed, geo-blocked, age-gated)
    Unavailable(UnavailableReason),
    /// Extractor breakage that usually clears with a simpler attempt
    Transient,
    /// Timeouts, resets and DNS trouble
    NetworkError,
    /// Nothing recognizable
    Unknown,
}

const AGE_GATE: &[&str] = &[
    "confirm your age",
    "age-restricted",
    "age restricted",
    "inappropriate for some users",
];

const PRIVATE: &[&str] = &[
    "private video",
    "video is private",
    "this account is private",
    "this post is private",
];

const REGION_BLOCKED: &[&str] = &[
    "not available in your country",
    "geo restricted",
    "geo-restricted",
    "blocked it in your country",
    "not made this video available in your country",
];

const REMOVED: &[&str] = &[
    "video has been removed",
    "this video does not exist",
    "account associated with this video has been terminated",
    "is no longer available",
    "http error 404",
    "no video could be found",
];

const GENERIC_UNAVAILABLE: &[&str] = &["video unavailable", "this video is not available", "video is not available"];

const AUTH_REQUIRED: &[&str] = &[
    "sign in to confirm you're not a bot",
    "sign in to confirm you’re not a bot",
    "confirm you're not a bot",
    "please sign in",
    "login required",
    "log in to",
    "requires authentication",
    "cookies are no longer valid",
    "cookies have likely been rotated",
    "use --cookies-from-browser",
    "use --cookies for the authentication",
];

const TRANSIENT: &[&str] = &[
    "failed to extract any player response",
    "unable to extract",
    "signature extraction failed",
    "nsig extraction failed",
    "http error 403",
    "http error 429",
    "unable to download webpage",
    "requested format is not available",
    "unable to download video data",
];

const NETWORK: &[&str] = &[
    "timed out",
    "timeouterror",
    "connection reset",
    "connection refused",
    "connection aborted",
    "network is unreachable",
    "temporary failure in name resolution",
    "failed to connect",
    "remote end closed connection",
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Analyzes yt-dlp stderr and determines the error type.
///
/// The age gate is checked before the sign-in patterns because YouTube words
/// it as "Sign in to confirm your age".
pub fn analyze_ytdlp_error(stderr: &str) -> YtDlpErrorType {
    let stderr_lower = stderr.to_lowercase();

    if contains_any(&stderr_lower, AGE_GATE) {
        return YtDlpErrorType::Unavailable(UnavailableReason::AgeRestricted);
    }
    if contains_any(&stderr_lower, PRIVATE) {
        return YtDlpErrorType::Unavailable(UnavailableReason::Private);
    }
    if contains_any(&stderr_lower, REGION_BLOCKED) {
        return YtDlpErrorType::Unavailable(UnavailableReason::RegionBlocked);
    }
    if contains_any(&stderr_lower, REMOVED) {
        return YtDlpErrorType::Unavailable(UnavailableReason::Removed);
    }
    if contains_any(&stderr_lower, AUTH_REQUIRED) {
        return YtDlpErrorType::AuthRequired;
    }
    if contains_any(&stderr_lower, GENERIC_UNAVAILABLE) {
        return YtDlpErrorType::Unavailable(UnavailableReason::Other);
    }
    if contains_any(&stderr_lower, TRANSIENT) {
        return YtDlpErrorType::Transient;
    }
    if contains_any(&stderr_lower, NETWORK) {
        return YtDlpErrorType::NetworkError;
    }

    YtDlpErrorType::Unknown
}

/// User-facing message. Never includes stderr, which may echo request data.
pub fn get_error_message(error_type: YtDlpErrorType, platform: Platform) -> String {
    let name = platform.label();
    match error_type {
        YtDlpErrorType::AuthRequired => format!(
            "{} requires a signed-in session for this content. Send cookies from a logged-in browser and try again.",
            name
        ),
        YtDlpErrorType::Unavailable(UnavailableReason::Private) => {
            format!("This {} content is private.", name)
        }
        YtDlpErrorType::Unavailable(UnavailableReason::Removed) => {
            format!("This {} content was removed or does not exist.", name)
        }
        YtDlpErrorType::Unavailable(UnavailableReason::RegionBlocked) => {
            format!("This {} content is not available in the server's region.", name)
        }
        YtDlpErrorType::Unavailable(UnavailableReason::AgeRestricted) => format!(
            "This {} content is age-restricted. Send cookies from an age-verified account.",
            name
        ),
        YtDlpErrorType::Unavailable(UnavailableReason::Other) => {
            format!("This {} content is unavailable.", name)
        }
        YtDlpErrorType::Transient | YtDlpErrorType::NetworkError => {
            format!("{} temporarily refused the request. Try again in a minute.", name)
        }
        YtDlpErrorType::Unknown => format!("Could not retrieve media from {}. Check that the link is correct.", name),
    }
}

/// Operator hints logged next to a failure
pub fn get_fix_recommendations(error_type: YtDlpErrorType) -> &'static str {
    match error_type {
        YtDlpErrorType::AuthRequired => {
            "🔧 Cookies missing or rotated: refresh YTDL_COOKIES_FILE (production) or sign in to the browser named in YTDL_COOKIES_BROWSER (development)"
        }
        YtDlpErrorType::Transient => {
            "🔧 Extractor breakage: run `ufd update-extractor`; persistent failures usually need a newer yt-dlp"
        }
        YtDlpErrorType::NetworkError => "🔧 Network trouble: check connectivity from the host",
        YtDlpErrorType::Unavailable(_) => "ℹ️ Content-side restriction, nothing to fix on our side",
        YtDlpErrorType::Unknown => "🔧 Unrecognized failure: inspect the stderr tail above",
    }
}

/// Classifies yt-dlp stderr into a [`DownloadError`] with a caller-safe message.
pub fn classify(stderr: &str, platform: Platform) -> DownloadError {
    let error_type = analyze_ytdlp_error(stderr);
    let message = get_error_message(error_type, platform);
    match error_type {
        YtDlpErrorType::AuthRequired => DownloadError::UpstreamAuthRequired(message),
        YtDlpErrorType::Unavailable(reason) => DownloadError::UpstreamUnavailable { reason, message },
        YtDlpErrorType::Transient | YtDlpErrorType::NetworkError => DownloadError::ExtractionTransient(message),
        YtDlpErrorType::Unknown => DownloadError::ExtractionFailed(message),
    }
}
