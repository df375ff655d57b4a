//! In-memory source reader and sink.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::core::Content;
use crate::errors::{DocflowError, WriteFailure};
use crate::io::{GlobSet, Sink, SourceFile, SourceReader};

/// A source reader over an in-memory file map.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemorySource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file at a `/`-separated relative path.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn read(&self, patterns: &[String]) -> Result<Vec<SourceFile>, DocflowError> {
        let globs = GlobSet::new(patterns)?;
        Ok(self
            .files
            .iter()
            .filter(|(path, _)| globs.is_match(path))
            .map(|(path, bytes)| SourceFile {
                path: PathBuf::from(path),
                content: Content::from(bytes.clone()),
            })
            .collect())
    }
}

/// A sink that keeps written artifacts in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    written: Mutex<Vec<(PathBuf, Vec<u8>)>>,
    failing: HashSet<PathBuf>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes writes to `path` fail.
    #[must_use]
    pub fn failing_on(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing.insert(path.into());
        self
    }

    /// Returns the successfully written paths in write order.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.written.lock().iter().map(|(path, _)| path.clone()).collect()
    }

    /// Returns the bytes last written to `path`.
    #[must_use]
    pub fn get(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.written
            .lock()
            .iter()
            .rev()
            .find(|(written, _)| written == path.as_ref())
            .map(|(_, bytes)| bytes.clone())
    }

    /// Returns the text last written to `path`.
    #[must_use]
    pub fn get_string(&self, path: impl AsRef<Path>) -> Option<String> {
        self.get(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), WriteFailure> {
        if self.failing.contains(path) {
            return Err(WriteFailure::new(path, "simulated write failure"));
        }
        self.written.lock().push((path.to_path_buf(), bytes.to_vec()));
        Ok(())
    }
}
