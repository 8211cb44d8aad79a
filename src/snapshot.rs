//! Stored copies of base-language trees.
//!
//! After every run the coordinator records the base tree it translated from.
//! The next automatic run can then ask which keys changed since.

use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::{Error, Result};
use crate::format::{self, FileStyle, Format};
use crate::tree::TranslationTree;

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    root: PathBuf,
}

impl SnapshotStore {
    /// Store snapshots in `dir` for files under `root`
    pub fn new(dir: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            root: root.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot file for `base_path`, flattened to a single file name
    pub fn path_for(&self, base_path: &Path) -> PathBuf {
        let relative = base_path.strip_prefix(&self.root).unwrap_or(base_path);
        let name = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("__");
        self.dir.join(format!("{}.snapshot.json", name))
    }

    /// Previously stored tree, `None` when no run has been recorded
    pub async fn load(&self, base_path: &Path) -> Result<Option<TranslationTree>> {
        let path = self.path_for(base_path);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(Error::FileRead { path, source }),
        };
        format::parse_str(&content, Format::Json, &path).map(Some)
    }

    pub async fn save(&self, base_path: &Path, tree: &TranslationTree) -> Result<()> {
        let path = self.path_for(base_path);
        format::write_file(&path, tree, Format::Json, &FileStyle::default()).await?;
        debug!(snapshot = %path.display(), "Saved base snapshot");
        Ok(())
    }
}
