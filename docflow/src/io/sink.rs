use super::Sink;
use crate::errors::WriteFailure;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::trace;

/// Writes artifacts below an output directory, creating parent directories.
#[derive(Debug, Clone)]
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    /// Creates a sink rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the output root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn target(&self, path: &Path) -> Result<PathBuf, WriteFailure> {
        let mut target = self.root.clone();
        for component in path.components() {
            match component {
                Component::Normal(part) => target.push(part),
                Component::CurDir | Component::RootDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(WriteFailure::new(path, "path escapes the output root"));
                }
            }
        }
        Ok(target)
    }
}

#[async_trait]
impl Sink for FsSink {
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), WriteFailure> {
        let target = self.target(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| WriteFailure::new(path, e.to_string()))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| WriteFailure::new(path, e.to_string()))?;
        trace!(path = %target.display(), bytes = bytes.len(), "Wrote artifact");
        Ok(())
    }
}
