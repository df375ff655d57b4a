//! Filesystem source reader.

use super::{GlobSet, SourceFile, SourceReader};
use crate::core::Content;
use crate::errors::DocflowError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Reads source files below a root directory.
///
/// File contents are read lazily, when a module first asks for them.
#[derive(Debug, Clone)]
pub struct FsSourceReader {
    root: PathBuf,
}

impl FsSourceReader {
    /// Creates a reader rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the input root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn relative_key(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn scan(root: &Path, globs: &GlobSet) -> Result<Vec<SourceFile>, DocflowError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let key = relative_key(relative);
        if !globs.is_match(&key) {
            continue;
        }
        let absolute = entry.path().to_path_buf();
        files.push(SourceFile {
            path: PathBuf::from(key),
            content: Content::producer(move || std::fs::read(&absolute)),
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

#[async_trait]
impl SourceReader for FsSourceReader {
    async fn read(&self, patterns: &[String]) -> Result<Vec<SourceFile>, DocflowError> {
        let globs = GlobSet::new(patterns)?;
        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || scan(&root, &globs))
            .await
            .map_err(|e| DocflowError::Internal(format!("source scan task failed: {e}")))??;
        debug!(
            root = %self.root.display(),
            patterns = ?patterns,
            count = files.len(),
            "Source files matched"
        );
        Ok(files)
    }
}
