//! Reading source files and writing artifacts.

use super::Module;
use crate::context::ExecutionContext;
use crate::core::Document;
use crate::errors::{DocflowError, WriteFailure};
use crate::io::{Sink, SourceReader};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Replaces the stream with the source files matching the patterns.
///
/// Each file becomes a document seeded with path metadata
/// (`SourceFileName`, `SourceFileBase`, `SourceExtension`, `RelativePath`),
/// in path order.
#[derive(Debug, Clone)]
pub struct ReadFiles {
    reader: Arc<dyn SourceReader>,
    patterns: Vec<String>,
}

impl ReadFiles {
    /// Creates the module.
    pub fn new<I, S>(reader: Arc<dyn SourceReader>, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reader,
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Module for ReadFiles {
    fn name(&self) -> &str {
        "ReadFiles"
    }

    async fn execute(
        &self,
        _inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        let files = self.reader.read(&self.patterns).await?;
        debug!(
            pipeline = %ctx.pipeline_name(),
            patterns = ?self.patterns,
            count = files.len(),
            "Read source files"
        );
        Ok(files
            .into_iter()
            .map(|file| Document::from_path(file.path).with_content(file.content))
            .collect())
    }
}

/// Hands every document with a destination to the sink and passes the
/// stream through unchanged.
///
/// A failed write is logged and recorded against the pipeline; the other
/// documents are still written. With `fail_fast_writes` the first failure
/// aborts the pipeline instead. Documents without a destination are skipped.
#[derive(Debug, Clone)]
pub struct WriteFiles {
    sink: Arc<dyn Sink>,
}

impl WriteFiles {
    /// Creates the module.
    #[must_use]
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self { sink }
    }

    async fn write_one(&self, doc: &Document) -> Result<bool, WriteFailure> {
        let Some(destination) = doc.destination() else {
            return Ok(false);
        };
        let bytes = doc
            .content_bytes()
            .map_err(|e| WriteFailure::new(destination, format!("reading content: {e}")))?;
        self.sink.write(destination, &bytes).await?;
        Ok(true)
    }
}

#[async_trait]
impl Module for WriteFiles {
    fn name(&self) -> &str {
        "WriteFiles"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        let fail_fast = ctx.settings().engine().fail_fast_writes;
        let mut written = 0usize;
        let mut skipped = 0usize;
        for doc in &inputs {
            match self.write_one(doc).await {
                Ok(true) => written += 1,
                Ok(false) => skipped += 1,
                Err(failure) if fail_fast => return Err(failure.into()),
                Err(failure) => {
                    warn!(
                        pipeline = %ctx.pipeline_name(),
                        path = %failure.path.display(),
                        error = %failure.message,
                        "Write failed"
                    );
                    ctx.record_write_failure(failure);
                }
            }
        }
        debug!(
            pipeline = %ctx.pipeline_name(),
            written,
            skipped,
            "Wrote documents"
        );
        Ok(inputs)
    }
}
