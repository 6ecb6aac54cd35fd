//! Ownership of transient files in the scratch directory.
//!
//! Every file a job creates is named `<prefix>_<uuid>...`; a [`ScratchFiles`] guard
//! owns all files sharing one stem and removes them exactly once, either on
//! explicit [`ScratchFiles::cleanup`] or when dropped.

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Suffixes yt-dlp uses for in-progress output
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp"];

/// Returns a collision-free stem like `media_3f2c...`.
pub fn unique_stem(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// Lists files in `dir` whose name starts with `stem`.
pub fn files_with_stem(dir: &Path, stem: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut found: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(stem))
        .map(|entry| entry.path())
        .collect();
    found.sort();
    found
}

/// Locates the finished output for `stem`, ignoring partial and fragment files.
///
/// yt-dlp picks the final extension itself (merge, audio conversion), so the
/// output is found by stem. When several candidates remain, the largest wins.
pub fn find_output(dir: &Path, stem: &str) -> Option<PathBuf> {
    files_with_stem(dir, stem)
        .into_iter()
        .filter(|path| is_plain_output(path, stem) && path.is_file())
        .max_by_key(|path| fs::metadata(path).map(|m| m.len()).unwrap_or(0))
}

// `media_<uuid>.mp4` and the like. Format-specific fragments look like `media_<uuid>.f137.mp4`.
fn is_plain_output(path: &Path, stem: &str) -> bool {
    let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
        return false;
    };
    if PARTIAL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
        return false;
    }
    path.file_stem().and_then(|s| s.to_str()) == Some(stem)
}

/// Guard over every scratch file sharing one stem.
#[derive(Debug)]
pub struct ScratchFiles {
    dir: PathBuf,
    stem: String,
    cleaned: bool,
}

impl ScratchFiles {
    /// New guard for a fresh unique stem under `dir`.
    pub fn new(dir: &Path, prefix: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            stem: unique_stem(prefix),
            cleaned: false,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// yt-dlp output template bound to this stem
    pub fn output_template(&self) -> String {
        self.dir
            .join(format!("{}.%(ext)s", self.stem))
            .to_string_lossy()
            .into_owned()
    }

    /// Removes leftovers of a failed attempt while keeping the guard armed.
    pub fn purge(&self) -> usize {
        remove_all(&files_with_stem(&self.dir, &self.stem))
    }

    /// Removes every file with this stem. Subsequent calls are no-ops.
    pub fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        let removed = self.purge();
        if removed > 0 {
            log::debug!("🧹 Removed {} scratch file(s) for {}", removed, self.stem);
        }
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn remove_all(paths: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove scratch file {}: {}", path.display(), e),
        }
    }
    removed
}
