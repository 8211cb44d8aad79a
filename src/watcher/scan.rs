use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

use super::FilePattern;
use crate::config::Config;
use crate::error::Result;
use crate::format::Format;
use crate::i18n::language_from_path;

/// A translation file found under the watch root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    pub path: PathBuf,
    pub language: String,
}

/// Language of `path` if it is a translation file the watcher tracks
pub(crate) fn resolve_language(config: &Config, pattern: &FilePattern, path: &Path) -> Option<String> {
    if config.is_snapshot_path(path) {
        return None;
    }
    Format::from_path(path)?;
    if !pattern.matches(&config.watch_path, path) {
        return None;
    }
    language_from_path(path)
}

/// Every tracked translation file under the watch root, sorted by path.
///
/// The snapshot directory is never entered and unreadable entries are
/// skipped.
pub fn scan_translation_files(config: &Config, pattern: &FilePattern) -> Vec<TrackedFile> {
    let mut files: Vec<TrackedFile> = WalkDir::new(&config.watch_path)
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && config.is_snapshot_path(e.path())))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let path = e.into_path();
            let language = resolve_language(config, pattern, &path)?;
            Some(TrackedFile { path, language })
        })
        .collect();

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

/// [`scan_translation_files`] on the blocking pool
pub(crate) async fn scan_in_background(
    config: Arc<Config>,
    pattern: FilePattern,
) -> Result<Vec<TrackedFile>> {
    Ok(tokio::task::spawn_blocking(move || scan_translation_files(&config, &pattern)).await?)
}
