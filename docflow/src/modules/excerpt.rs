//! Excerpt extraction from rendered HTML.

use super::Module;
use crate::context::ExecutionContext;
use crate::core::{keys, Document};
use crate::errors::DocflowError;
use async_trait::async_trait;

/// Returns the first `<p>` element, tags included. Matching is ASCII
/// case-insensitive and `<pre>`/`<param>` do not count as paragraphs.
fn first_paragraph(html: &str) -> Option<&str> {
    let lower = html.to_ascii_lowercase();
    let mut from = 0;
    while let Some(offset) = lower[from..].find("<p") {
        let start = from + offset;
        let after = lower.as_bytes().get(start + 2).copied();
        if matches!(after, Some(b'>' | b' ' | b'\t' | b'\n' | b'\r')) {
            let end = lower[start..].find("</p>")? + start + "</p>".len();
            return html.get(start..end);
        }
        from = start + 2;
    }
    None
}

/// Stores the first `<p>` element of the content under `Excerpt`.
///
/// Documents that already have the key, or have no paragraph, are left
/// unchanged.
#[derive(Debug, Clone)]
pub struct GenerateExcerpt {
    key: String,
}

impl Default for GenerateExcerpt {
    fn default() -> Self {
        Self {
            key: keys::EXCERPT.to_string(),
        }
    }
}

impl GenerateExcerpt {
    /// Creates the module writing to `Excerpt`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes to another key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }
}

#[async_trait]
impl Module for GenerateExcerpt {
    fn name(&self) -> &str {
        "GenerateExcerpt"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        _ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        inputs
            .into_iter()
            .map(|doc| {
                if doc.contains_key(&self.key) {
                    return Ok(doc);
                }
                let html = doc.content_string()?;
                let excerpt = first_paragraph(&html).map(str::to_string);
                Ok(match excerpt {
                    Some(excerpt) => doc.with(self.key.clone(), excerpt),
                    None => doc,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MetadataAccess;
    use crate::testing::{doc, test_context};

    #[test]
    fn test_first_paragraph_skips_pre() {
        assert_eq!(first_paragraph("<pre>x</pre><P>y</P>"), Some("<P>y</P>"));
        assert_eq!(first_paragraph("<p>unclosed"), None);
        assert_eq!(first_paragraph("no html"), None);
    }

    #[tokio::test]
    async fn test_first_paragraph() {
        let html = "<h1>T</h1>\n<p class=\"lead\">First\nline</p><p>Second</p>";
        let out = GenerateExcerpt::new()
            .execute(vec![doc("A").with_content(html)], &test_context("Posts"))
            .await
            .unwrap();
        assert_eq!(
            out[0].get_string(keys::EXCERPT).unwrap(),
            "<p class=\"lead\">First\nline</p>"
        );
    }

    #[tokio::test]
    async fn test_keeps_existing_and_skips_without_paragraph() {
        let docs = vec![
            doc("A").with(keys::EXCERPT, "custom").with_content("<p>x</p>"),
            doc("B").with_content("<pre>code</pre>"),
        ];
        let out = GenerateExcerpt::new()
            .execute(docs, &test_context("Posts"))
            .await
            .unwrap();
        assert_eq!(out[0].get_string(keys::EXCERPT).unwrap(), "custom");
        assert!(!out[1].contains_key(keys::EXCERPT));
    }
}
