//! Source readers and output sinks: the engine's only contact with storage.

mod glob;
mod reader;
mod sink;

pub use glob::GlobSet;
pub use reader::FsSourceReader;
pub use sink::FsSink;

use crate::core::Content;
use crate::errors::{DocflowError, WriteFailure};
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// A raw source file handed to the Input phase.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the reader's root, `/`-separated.
    pub path: PathBuf,
    /// File bytes, possibly read lazily.
    pub content: Content,
}

/// Finds source files by glob-like patterns.
#[async_trait]
pub trait SourceReader: Send + Sync + Debug {
    /// Returns the files matching any pattern and no `!` exclusion, ordered
    /// by path.
    async fn read(&self, patterns: &[String]) -> Result<Vec<SourceFile>, DocflowError>;
}

/// Receives output artifacts.
#[async_trait]
pub trait Sink: Send + Sync + Debug {
    /// Writes one artifact to a path relative to the output root.
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), WriteFailure>;
}
