//! Scripted extractor backends for engine and delivery tests
//!
//! No network and no yt-dlp: outputs are written straight into the scratch
//! directory, piped transfers are plain `sh -c` scripts.

pub mod mock_extractor;

pub use mock_extractor::{MockExtractor, MockExtractorConfig};
