//! The module contract and the module library.
//!
//! A module transforms an ordered stream of documents. Modules run one after
//! another inside a phase; the engine checks for cancellation between them.

mod content;
mod destination;
mod documents;
mod excerpt;
mod feeds;
mod files;
mod group;
mod layout;
mod merge;
mod order;
mod paginate;
mod template;

pub use content::{
    split_front_matter, ContentTransform, ExtractFrontMatter, FrontMatterParser, JsonFrontMatter,
    RenderMarkdown,
};
#[cfg(feature = "markdown")]
pub use content::MarkdownTransform;
pub use destination::{OptimizeFileName, SetDestination};
pub use documents::{
    AddTitle, ConcatDocuments, FilterDocuments, ReplaceDocuments, SetContent, SetMetadata,
    TakeDocuments,
};
pub use excerpt::GenerateExcerpt;
pub use feeds::{FeedArtifact, FeedItem, FeedMetadata, FeedSerializer, GenerateFeeds, JsonFeedSerializer};
pub use files::{ReadFiles, WriteFiles};
pub use group::GroupDocuments;
pub use layout::Layout;
pub use merge::MergeDocuments;
pub use order::OrderDocuments;
pub use paginate::PaginateDocuments;
pub use template::{Partials, RenderTemplate, TemplateModelFn, TemplateRenderer};

use crate::context::ExecutionContext;
use crate::core::Document;
use crate::errors::DocflowError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, warn};

/// A transform over an ordered document stream.
///
/// Modules may fan out (one input, many outputs) or fan in (many inputs,
/// one output). Unless documented otherwise, output order follows input
/// order.
#[async_trait]
pub trait Module: Send + Sync + Debug {
    /// Returns the name of the module, used in logs and errors.
    fn name(&self) -> &str;

    /// Executes the module.
    ///
    /// # Errors
    ///
    /// Any error aborts the owning pipeline.
    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError>;
}

/// An ordered list of modules, shareable between pipelines.
pub type ModuleList = Vec<Arc<dyn Module>>;

/// A per-document value computed from the document and the context.
pub type DocumentFn<T> =
    Arc<dyn Fn(&Document, &ExecutionContext) -> Result<T, DocflowError> + Send + Sync>;

/// Runs modules in order, feeding each one's output to the next.
///
/// # Errors
///
/// Returns `Cancelled` if the run's token fires between modules, or the
/// first module error.
pub async fn run_modules(
    modules: &[Arc<dyn Module>],
    mut documents: Vec<Document>,
    ctx: &ExecutionContext,
) -> Result<Vec<Document>, DocflowError> {
    for module in modules {
        if ctx.is_cancelled() {
            return Err(DocflowError::Cancelled(
                ctx.cancellation().reason().unwrap_or_default(),
            ));
        }
        let count = documents.len();
        documents = module.execute(documents, ctx).await?;
        debug!(
            pipeline = %ctx.pipeline_name(),
            phase = %ctx.phase(),
            module = %module.name(),
            inputs = count,
            outputs = documents.len(),
            "Module executed"
        );
    }
    Ok(documents)
}

/// A module backed by a synchronous closure over the whole stream.
pub struct FnModule<F>
where
    F: Fn(Vec<Document>, &ExecutionContext) -> Result<Vec<Document>, DocflowError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnModule<F>
where
    F: Fn(Vec<Document>, &ExecutionContext) -> Result<Vec<Document>, DocflowError> + Send + Sync,
{
    /// Creates a new closure-backed module.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnModule<F>
where
    F: Fn(Vec<Document>, &ExecutionContext) -> Result<Vec<Document>, DocflowError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnModule").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Module for FnModule<F>
where
    F: Fn(Vec<Document>, &ExecutionContext) -> Result<Vec<Document>, DocflowError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        (self.func)(inputs, ctx)
    }
}

/// Applies the malformed-content policy to a per-document parse failure:
/// drops the document with a warning when the engine skips malformed
/// content, fails otherwise.
pub(crate) fn malformed(
    ctx: &ExecutionContext,
    document: &Document,
    message: impl Into<String>,
) -> Result<Option<Document>, DocflowError> {
    let message = message.into();
    if ctx.settings().engine().skip_malformed_content {
        warn!(
            pipeline = %ctx.pipeline_name(),
            source = %document.source(),
            error = %message,
            "Skipping document with malformed content"
        );
        Ok(None)
    } else {
        Err(DocflowError::malformed(document.source().to_string(), message))
    }
}
