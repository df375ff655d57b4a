//! Destination assignment.
//!
//! Destinations are always derived from the document as it is now, never
//! from a previously cached value, so a rule can be re-applied after any
//! metadata change and produce the same result.

use super::{DocumentFn, Module};
use crate::context::ExecutionContext;
use crate::core::{keys, Document, MetadataValue};
use crate::errors::DocflowError;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

enum Rule {
    Fixed(PathBuf),
    Extension(String),
    Computed(DocumentFn<PathBuf>),
}

/// Sets each document's destination from a rule.
pub struct SetDestination {
    rule: Rule,
}

impl SetDestination {
    /// Sends every document to the same path.
    #[must_use]
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self {
            rule: Rule::Fixed(path.into()),
        }
    }

    /// Keeps the relative source path and swaps the extension. Documents
    /// without a source path keep their current destination with the new
    /// extension.
    #[must_use]
    pub fn extension(extension: impl Into<String>) -> Self {
        Self {
            rule: Rule::Extension(extension.into().trim_start_matches('.').to_string()),
        }
    }

    /// Computes the destination per document.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Document, &ExecutionContext) -> Result<PathBuf, DocflowError> + Send + Sync + 'static,
    {
        Self {
            rule: Rule::Computed(Arc::new(f)),
        }
    }

    fn destination_for(
        &self,
        doc: &Document,
        ctx: &ExecutionContext,
    ) -> Result<Option<PathBuf>, DocflowError> {
        Ok(match &self.rule {
            Rule::Fixed(path) => Some(path.clone()),
            Rule::Computed(f) => Some(f(doc, ctx)?),
            Rule::Extension(ext) => doc
                .get(keys::RELATIVE_PATH)
                .and_then(MetadataValue::as_str)
                .map(PathBuf::from)
                .or_else(|| doc.source_path().map(Path::to_path_buf))
                .or_else(|| doc.destination().map(Path::to_path_buf))
                .map(|path| path.with_extension(ext)),
        })
    }
}

impl fmt::Debug for SetDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = match &self.rule {
            Rule::Fixed(path) => format!("path({})", path.display()),
            Rule::Extension(ext) => format!("extension({ext})"),
            Rule::Computed(_) => "computed".to_string(),
        };
        f.debug_struct("SetDestination").field("rule", &rule).finish()
    }
}

#[async_trait]
impl Module for SetDestination {
    fn name(&self) -> &str {
        "SetDestination"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        inputs
            .into_iter()
            .map(|doc| {
                Ok(match self.destination_for(&doc, ctx)? {
                    Some(destination) => doc.with_destination(destination),
                    None => doc,
                })
            })
            .collect()
    }
}

/// Rewrites the destination file name into a URL-friendly slug.
///
/// Only the file stem changes: the directory and extension are kept, the
/// stem is lowercased and every run of characters other than ASCII letters
/// and digits becomes a single `-`. Documents without a destination pass
/// through.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizeFileName;

impl OptimizeFileName {
    /// Creates the module.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Lowercases and collapses non-alphanumeric runs to `-`.
#[must_use]
pub(crate) fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

fn optimize(path: &Path) -> PathBuf {
    let Some(stem) = path.file_stem().map(|s| s.to_string_lossy()) else {
        return path.to_path_buf();
    };
    let slug = slugify(&stem);
    if slug.is_empty() {
        return path.to_path_buf();
    }
    let file_name = match path.extension() {
        Some(ext) => format!("{slug}.{}", ext.to_string_lossy().to_lowercase()),
        None => slug,
    };
    path.with_file_name(file_name)
}

#[async_trait]
impl Module for OptimizeFileName {
    fn name(&self) -> &str {
        "OptimizeFileName"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        _ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        Ok(inputs
            .into_iter()
            .map(|doc| match doc.destination().map(optimize) {
                Some(destination) => doc.with_destination(destination),
                None => doc,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MetadataAccess;
    use crate::testing::{doc, test_context};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("C# & .NET"), "c-net");
        assert_eq!(slugify("--already-ok--"), "already-ok");
    }

    #[tokio::test]
    async fn test_extension_rule_uses_relative_path() {
        let out = SetDestination::extension(".html")
            .execute(vec![Document::from_path("posts/2020/first.md")], &test_context("Posts"))
            .await
            .unwrap();
        assert_eq!(out[0].destination(), Some(Path::new("posts/2020/first.html")));
    }

    #[tokio::test]
    async fn test_fixed_and_computed_rules() {
        let ctx = test_context("Tags");
        let fixed = SetDestination::path("index.html")
            .execute(vec![doc("A")], &ctx)
            .await
            .unwrap();
        assert_eq!(fixed[0].destination(), Some(Path::new("index.html")));

        let computed = SetDestination::new(|d, _| {
            Ok(PathBuf::from(format!("tags/{}.html", d.get_string(keys::GROUP_KEY)?)))
        })
        .execute(vec![doc("g").with(keys::GROUP_KEY, "Web Dev")], &ctx)
        .await
        .unwrap();
        assert_eq!(computed[0].destination(), Some(Path::new("tags/Web Dev.html")));
    }

    #[tokio::test]
    async fn test_optimize_keeps_directory() {
        let ctx = test_context("Tags");
        let input = doc("g")
            .with(keys::GROUP_KEY, "Web Dev")
            .with_destination("tags/Web Dev.HTML");
        let out = OptimizeFileName::new().execute(vec![input], &ctx).await.unwrap();
        assert_eq!(out[0].destination(), Some(Path::new("tags/web-dev.html")));
    }

    #[tokio::test]
    async fn test_destination_rule_is_repeatable() {
        let ctx = test_context("Tags");
        let rule = SetDestination::new(|d, _| {
            Ok(PathBuf::from(format!("tags/{}.html", d.get_string(keys::GROUP_KEY)?)))
        });
        let input = doc("g").with(keys::GROUP_KEY, "rust");

        let once = rule.execute(vec![input.clone()], &ctx).await.unwrap();
        let twice = rule.execute(once.clone(), &ctx).await.unwrap();
        assert_eq!(once[0].destination(), twice[0].destination());

        let renamed = rule
            .execute(vec![twice[0].clone().with(keys::GROUP_KEY, "go")], &ctx)
            .await
            .unwrap();
        assert_eq!(renamed[0].destination(), Some(Path::new("tags/go.html")));
    }

    #[tokio::test]
    async fn test_missing_destination_passes_through() {
        let out = OptimizeFileName::new()
            .execute(vec![doc("A")], &test_context("Posts"))
            .await
            .unwrap();
        assert!(out[0].destination().is_none());
    }
}
