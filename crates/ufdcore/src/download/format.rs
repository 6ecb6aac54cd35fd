//! Format selection policy: (format, quality) → yt-dlp format selector.
//!
//! Selectors are ranked `/`-separated alternatives; yt-dlp takes the first one
//! the source can satisfy. Everything here is pure and deterministic.

use crate::download::error::DownloadError;
use crate::download::types::{MediaFormat, Quality};

/// The one audio selector. Quality never applies to audio.
pub const AUDIO_SELECTOR: &str = "bestaudio[ext=m4a]/bestaudio/best";

/// Height filter fragment, empty for `Highest`. `<=?` keeps streams with unknown height.
fn height_filter(quality: Quality) -> String {
    quality
        .max_height()
        .map(|h| format!("[height<=?{h}]"))
        .unwrap_or_default()
}

fn require_quality(format: MediaFormat, quality: Option<Quality>) -> Result<Quality, DownloadError> {
    quality.ok_or_else(|| DownloadError::InvalidFormatQuality(format!("{} requires a quality tier", format)))
}

/// Primary selector for a retrieval.
///
/// Video prefers an H.264 mp4 + m4a pair (merges into a widely playable mp4),
/// then any pair under the same ceiling, then single-file formats.
pub fn select_format(format: MediaFormat, quality: Option<Quality>) -> Result<String, DownloadError> {
    match format {
        MediaFormat::Audio => Ok(AUDIO_SELECTOR.to_string()),
        MediaFormat::Video => {
            let filt = height_filter(require_quality(format, quality)?);
            let parts = [
                format!("bestvideo{filt}[ext=mp4][vcodec^=avc1]+bestaudio[ext=m4a]"),
                format!("bestvideo{filt}+bestaudio"),
                format!("best{filt}[ext=mp4]"),
                format!("best{filt}"),
                "best".to_string(),
            ];
            Ok(parts.join("/"))
        }
    }
}

/// Single-file (already muxed) selector for direct-pipe delivery,
/// where separate video and audio streams cannot be merged.
pub fn select_progressive_format(format: MediaFormat, quality: Option<Quality>) -> Result<String, DownloadError> {
    match format {
        MediaFormat::Audio => Ok(AUDIO_SELECTOR.to_string()),
        MediaFormat::Video => {
            let filt = height_filter(require_quality(format, quality)?);
            Ok(format!("best{filt}[ext=mp4]/best{filt}/best"))
        }
    }
}

/// Loose selector used by the fallback attempt: no codec or container preferences.
pub fn select_fallback_format(format: MediaFormat, quality: Option<Quality>) -> Result<String, DownloadError> {
    match format {
        MediaFormat::Audio => Ok("bestaudio/best".to_string()),
        MediaFormat::Video => {
            let filt = height_filter(require_quality(format, quality)?);
            Ok(format!("bestvideo{filt}+bestaudio/best{filt}/best"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_every_valid_pair_yields_expression() {
        for quality in Quality::iter() {
            for format in MediaFormat::iter() {
                let expr = select_format(format, Some(quality)).unwrap();
                assert!(!expr.is_empty());
                assert!(!select_progressive_format(format, Some(quality)).unwrap().is_empty());
                assert!(!select_fallback_format(format, Some(quality)).unwrap().is_empty());
            }
        }
    }

    #[test]
    fn test_audio_ignores_quality() {
        let reference = select_format(MediaFormat::Audio, None).unwrap();
        for quality in Quality::iter() {
            assert_eq!(select_format(MediaFormat::Audio, Some(quality)).unwrap(), reference);
        }
    }

    #[test]
    fn test_video_highest_has_no_ceiling() {
        let expr = select_format(MediaFormat::Video, Some(Quality::Highest)).unwrap();
        assert!(!expr.contains("height"));
        assert!(expr.starts_with("bestvideo[ext=mp4][vcodec^=avc1]+bestaudio[ext=m4a]"));
        assert!(expr.ends_with("/best"));
    }

    #[test]
    fn test_video_ceiling_substituted() {
        let expr = select_format(MediaFormat::Video, Some(Quality::Hd720)).unwrap();
        assert_eq!(
            expr,
            "bestvideo[height<=?720][ext=mp4][vcodec^=avc1]+bestaudio[ext=m4a]/bestvideo[height<=?720]+bestaudio/best[height<=?720][ext=mp4]/best[height<=?720]/best"
        );
        let expr = select_format(MediaFormat::Video, Some(Quality::Sd360)).unwrap();
        assert!(expr.contains("[height<=?360]"));
        assert!(!expr.contains("720"));
    }

    #[test]
    fn test_video_without_quality_is_invalid() {
        let err = select_format(MediaFormat::Video, None).unwrap_err();
        assert!(matches!(err, DownloadError::InvalidFormatQuality(_)));
    }

    #[test]
    fn test_deterministic() {
        let a = select_format(MediaFormat::Video, Some(Quality::Hd1080)).unwrap();
        let b = select_format(MediaFormat::Video, Some(Quality::Hd1080)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_progressive_never_merges() {
        for quality in Quality::iter() {
            let expr = select_progressive_format(MediaFormat::Video, Some(quality)).unwrap();
            assert!(!expr.contains('+'));
        }
    }
}
