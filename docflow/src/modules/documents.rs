//! Stream-level modules: cross-pipeline fan-in, metadata and content
//! setters, filtering.

use super::{DocumentFn, Module};
use crate::context::ExecutionContext;
use crate::core::{keys, Document, MetadataAccess, MetadataValue};
use crate::errors::DocflowError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

fn outputs_of_all(names: &[String], ctx: &ExecutionContext) -> Result<Vec<Document>, DocflowError> {
    if names.is_empty() {
        return Ok(ctx.outputs_of_dependencies()?);
    }
    let mut documents = Vec::new();
    for name in names {
        documents.extend(ctx.outputs_of(name)?);
    }
    Ok(documents)
}

/// Replaces the stream with the finished output of dependency pipelines.
///
/// With no names, all direct dependencies are used in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ReplaceDocuments {
    pipelines: Vec<String>,
}

impl ReplaceDocuments {
    /// Replaces with the outputs of the named pipelines, concatenated.
    #[must_use]
    pub fn new<I, S>(pipelines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pipelines: pipelines.into_iter().map(Into::into).collect(),
        }
    }

    /// Replaces with the outputs of every direct dependency.
    #[must_use]
    pub fn dependencies() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Module for ReplaceDocuments {
    fn name(&self) -> &str {
        "ReplaceDocuments"
    }

    async fn execute(
        &self,
        _inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        outputs_of_all(&self.pipelines, ctx)
    }
}

/// Appends the finished output of dependency pipelines to the stream.
#[derive(Debug, Clone, Default)]
pub struct ConcatDocuments {
    pipelines: Vec<String>,
}

impl ConcatDocuments {
    /// Appends the outputs of the named pipelines.
    #[must_use]
    pub fn new<I, S>(pipelines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pipelines: pipelines.into_iter().map(Into::into).collect(),
        }
    }

    /// Appends the outputs of every direct dependency.
    #[must_use]
    pub fn dependencies() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Module for ConcatDocuments {
    fn name(&self) -> &str {
        "ConcatDocuments"
    }

    async fn execute(
        &self,
        mut inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        inputs.extend(outputs_of_all(&self.pipelines, ctx)?);
        Ok(inputs)
    }
}

type ContextFn<T> = Arc<dyn Fn(&ExecutionContext) -> Result<T, DocflowError> + Send + Sync>;

enum ValueSource {
    Fixed(MetadataValue),
    PerDocument(DocumentFn<MetadataValue>),
    PerRun(ContextFn<MetadataValue>),
}

/// Sets one metadata key on every document.
pub struct SetMetadata {
    key: String,
    value: ValueSource,
}

impl SetMetadata {
    /// Sets the same value everywhere.
    #[must_use]
    pub fn value(key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        Self {
            key: key.into(),
            value: ValueSource::Fixed(value.into()),
        }
    }

    /// Computes the value per document.
    pub fn new<F>(key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Document, &ExecutionContext) -> Result<MetadataValue, DocflowError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            key: key.into(),
            value: ValueSource::PerDocument(Arc::new(f)),
        }
    }

    /// Computes the value once per execution from the context.
    pub fn from_context<F>(key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ExecutionContext) -> Result<MetadataValue, DocflowError> + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            value: ValueSource::PerRun(Arc::new(f)),
        }
    }
}

impl fmt::Debug for SetMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetMetadata").field("key", &self.key).finish()
    }
}

#[async_trait]
impl Module for SetMetadata {
    fn name(&self) -> &str {
        "SetMetadata"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        let shared = match &self.value {
            ValueSource::Fixed(value) => Some(value.clone()),
            ValueSource::PerRun(f) if !inputs.is_empty() => Some(f(ctx)?),
            _ => None,
        };
        inputs
            .into_iter()
            .map(|doc| {
                let value = match (&shared, &self.value) {
                    (Some(value), _) => value.clone(),
                    (None, ValueSource::PerDocument(f)) => f(&doc, ctx)?,
                    (None, _) => return Ok(doc),
                };
                Ok(doc.with(self.key.clone(), value))
            })
            .collect()
    }
}

/// Replaces each document's content.
pub struct SetContent {
    content: DocumentFn<String>,
}

impl SetContent {
    /// Computes the content per document.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Document, &ExecutionContext) -> Result<String, DocflowError> + Send + Sync + 'static,
    {
        Self {
            content: Arc::new(f),
        }
    }

    /// Uses the string stored under a metadata key.
    #[must_use]
    pub fn from_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(move |doc, _| Ok(doc.get_string(&key)?))
    }
}

impl fmt::Debug for SetContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetContent").finish_non_exhaustive()
    }
}

#[async_trait]
impl Module for SetContent {
    fn name(&self) -> &str {
        "SetContent"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        inputs
            .into_iter()
            .map(|doc| {
                let content = (self.content)(&doc, ctx)?;
                Ok(doc.with_content(content))
            })
            .collect()
    }
}

/// Sets `Title` from the source file name when it is missing.
///
/// `hello-world_post.md` becomes `Hello World Post`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddTitle;

impl AddTitle {
    /// Creates the module.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn title_from_file_base(base: &str) -> String {
    base.split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Module for AddTitle {
    fn name(&self) -> &str {
        "AddTitle"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        _ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        Ok(inputs
            .into_iter()
            .map(|doc| {
                if doc.contains_key(keys::TITLE) {
                    return doc;
                }
                match doc.get(keys::SOURCE_FILE_BASE).and_then(MetadataValue::to_text) {
                    Some(base) => {
                        let title = title_from_file_base(&base);
                        doc.with(keys::TITLE, title)
                    }
                    None => doc,
                }
            })
            .collect())
    }
}

/// Keeps documents matching a predicate, in order.
pub struct FilterDocuments {
    predicate: DocumentFn<bool>,
}

impl FilterDocuments {
    /// Keeps documents for which `predicate` returns true.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Document, &ExecutionContext) -> Result<bool, DocflowError> + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// Keeps documents that have `key`.
    #[must_use]
    pub fn containing_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(move |doc, _| Ok(doc.contains_key(&key)))
    }
}

impl fmt::Debug for FilterDocuments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterDocuments").finish_non_exhaustive()
    }
}

#[async_trait]
impl Module for FilterDocuments {
    fn name(&self) -> &str {
        "FilterDocuments"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        let mut kept = Vec::with_capacity(inputs.len());
        for doc in inputs {
            if (self.predicate)(&doc, ctx)? {
                kept.push(doc);
            }
        }
        Ok(kept)
    }
}

/// Keeps the first `count` documents.
#[derive(Debug, Clone, Copy)]
pub struct TakeDocuments {
    count: usize,
}

impl TakeDocuments {
    /// Creates the module.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self { count }
    }
}

#[async_trait]
impl Module for TakeDocuments {
    fn name(&self) -> &str {
        "TakeDocuments"
    }

    async fn execute(
        &self,
        mut inputs: Vec<Document>,
        _ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        inputs.truncate(self.count);
        Ok(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ContextError;
    use crate::testing::{assert_titles, doc, test_context, TestRun};
    use pretty_assertions::assert_eq;

    fn run() -> TestRun {
        TestRun::new()
            .with_outputs("Posts", vec![doc("A"), doc("B")])
            .with_outputs("Pages", vec![doc("About")])
    }

    #[tokio::test]
    async fn test_replace_named_and_all() {
        let ctx = run().context("Tags");

        let named = ReplaceDocuments::new(["Posts"])
            .execute(vec![doc("scaffold")], &ctx)
            .await
            .unwrap();
        assert_titles(&named, &["A", "B"]);

        let all = ReplaceDocuments::dependencies()
            .execute(vec![], &ctx)
            .await
            .unwrap();
        assert_titles(&all, &["A", "B", "About"]);
    }

    #[tokio::test]
    async fn test_concat_appends() {
        let ctx = run().context("Feed");
        let out = ConcatDocuments::new(["Pages"])
            .execute(vec![doc("X")], &ctx)
            .await
            .unwrap();
        assert_titles(&out, &["X", "About"]);
    }

    #[tokio::test]
    async fn test_replace_unknown_pipeline() {
        let ctx = run().context("Tags");
        let err = ReplaceDocuments::new(["Nope"])
            .execute(vec![], &ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DocflowError::Context(ContextError::UnknownPipeline { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_metadata_variants() {
        let ctx = test_context("Posts");
        let docs = vec![doc("A"), doc("B")];

        let fixed = SetMetadata::value("layout", "post")
            .execute(docs.clone(), &ctx)
            .await
            .unwrap();
        assert_eq!(fixed[1].get_string("layout").unwrap(), "post");

        let computed = SetMetadata::new("Upper", |d, _| {
            Ok(d.get_string(keys::TITLE)?.to_uppercase().into())
        })
        .execute(docs.clone(), &ctx)
        .await
        .unwrap();
        assert_eq!(computed[0].get_string("Upper").unwrap(), "A");

        let per_run = SetMetadata::from_context("Pipeline", |c| Ok(c.pipeline_name().into()))
            .execute(docs, &ctx)
            .await
            .unwrap();
        assert_eq!(per_run[0].get_string("Pipeline").unwrap(), "Posts");
    }

    #[tokio::test]
    async fn test_set_content_from_key() {
        let ctx = test_context("Posts");
        let out = SetContent::from_key("template")
            .execute(vec![doc("A").with("template", "<html>")], &ctx)
            .await
            .unwrap();
        assert_eq!(out[0].content_string().unwrap(), "<html>");

        let missing = SetContent::from_key("template")
            .execute(vec![doc("A")], &ctx)
            .await;
        assert!(matches!(missing, Err(DocflowError::Metadata(_))));
    }

    #[tokio::test]
    async fn test_add_title() {
        let ctx = test_context("Posts");
        let out = AddTitle::new()
            .execute(
                vec![
                    Document::from_path("posts/hello-world_post.md"),
                    Document::from_path("posts/kept.md").with(keys::TITLE, "Kept Title"),
                ],
                &ctx,
            )
            .await
            .unwrap();
        assert_titles(&out, &["Hello World Post", "Kept Title"]);
    }

    #[tokio::test]
    async fn test_filter_and_take() {
        let ctx = test_context("Posts");
        let docs = vec![doc("A").with("partial", "head"), doc("B"), doc("C").with("partial", "foot")];

        let partials = FilterDocuments::containing_key("partial")
            .execute(docs.clone(), &ctx)
            .await
            .unwrap();
        assert_titles(&partials, &["A", "C"]);

        let first = TakeDocuments::new(2).execute(docs, &ctx).await.unwrap();
        assert_titles(&first, &["A", "B"]);
    }
}
