//! Content parsing and conversion modules backed by pluggable parsers.

use super::{malformed, Module};
use crate::context::ExecutionContext;
use crate::core::{Document, Metadata, MetadataValue};
use crate::errors::DocflowError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Splits raw source into front matter metadata and body.
pub trait FrontMatterParser: Send + Sync + Debug {
    /// Parses raw content.
    ///
    /// Returns `Ok(None)` when the content carries no front matter.
    ///
    /// # Errors
    ///
    /// Returns a parser diagnostic when front matter is present but invalid.
    fn parse(&self, raw: &str) -> Result<Option<(Metadata, String)>, String>;
}

/// Splits `text` into the block between two delimiter lines at the very
/// start and the remaining body.
///
/// The opening line must be exactly `delimiter` (trailing whitespace
/// allowed); the block ends at the next such line.
#[must_use]
pub fn split_front_matter<'a>(text: &'a str, delimiter: &str) -> Option<(&'a str, &'a str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != delimiter {
        return None;
    }

    let start = first.len();
    let mut offset = start;
    for line in lines {
        if line.trim_end() == delimiter {
            let block = &text[start..offset];
            let body = &text[offset + line.len()..];
            return Some((block, body));
        }
        offset += line.len();
    }
    None
}

/// Front matter written as a JSON object between `---` lines.
#[derive(Debug, Clone)]
pub struct JsonFrontMatter {
    delimiter: String,
}

impl Default for JsonFrontMatter {
    fn default() -> Self {
        Self {
            delimiter: "---".to_string(),
        }
    }
}

impl JsonFrontMatter {
    /// Creates a parser using `---` delimiters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses another delimiter line.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }
}

impl FrontMatterParser for JsonFrontMatter {
    fn parse(&self, raw: &str) -> Result<Option<(Metadata, String)>, String> {
        let Some((block, body)) = split_front_matter(raw, &self.delimiter) else {
            return Ok(None);
        };
        if block.trim().is_empty() {
            return Ok(Some((Metadata::new(), body.to_string())));
        }
        match serde_json::from_str::<serde_json::Value>(block).map_err(|e| e.to_string())? {
            serde_json::Value::Object(map) => {
                Ok(Some((Metadata::from_json_object(map), body.to_string())))
            }
            other => Err(format!(
                "front matter must be an object, found {}",
                MetadataValue::from_json(other).type_name()
            )),
        }
    }
}

/// Moves front matter into metadata and leaves the body as content.
///
/// Parsed keys overwrite existing ones. A parse failure is a malformed
/// content error, or a skipped document when the engine is configured to
/// skip malformed content.
#[derive(Debug, Clone)]
pub struct ExtractFrontMatter {
    parser: Arc<dyn FrontMatterParser>,
}

impl ExtractFrontMatter {
    /// Creates the module.
    #[must_use]
    pub fn new(parser: Arc<dyn FrontMatterParser>) -> Self {
        Self { parser }
    }
}

impl Default for ExtractFrontMatter {
    fn default() -> Self {
        Self::new(Arc::new(JsonFrontMatter::new()))
    }
}

#[async_trait]
impl Module for ExtractFrontMatter {
    fn name(&self) -> &str {
        "ExtractFrontMatter"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        let mut outputs = Vec::with_capacity(inputs.len());
        for doc in inputs {
            let raw = match doc.content_string() {
                Ok(raw) => raw,
                Err(DocflowError::MalformedContent { message, .. }) => {
                    outputs.extend(malformed(ctx, &doc, message)?);
                    continue;
                }
                Err(e) => return Err(e),
            };
            match self.parser.parse(&raw) {
                Ok(Some((metadata, body))) => {
                    outputs.push(doc.with_merged_metadata(&metadata).with_content(body));
                }
                Ok(None) => outputs.push(doc),
                Err(message) => outputs.extend(malformed(ctx, &doc, message)?),
            }
        }
        Ok(outputs)
    }
}

/// Converts text content, e.g. markdown to HTML.
pub trait ContentTransform: Send + Sync + Debug {
    /// Transforms one document's content.
    ///
    /// # Errors
    ///
    /// Returns a diagnostic if the input cannot be converted.
    fn transform(&self, input: &str) -> Result<String, String>;
}

/// Replaces each document's content with its transformed form.
#[derive(Debug, Clone)]
pub struct RenderMarkdown {
    transform: Arc<dyn ContentTransform>,
}

impl RenderMarkdown {
    /// Creates the module with a content transform.
    #[must_use]
    pub fn new(transform: Arc<dyn ContentTransform>) -> Self {
        Self { transform }
    }
}

#[cfg(feature = "markdown")]
impl Default for RenderMarkdown {
    fn default() -> Self {
        Self::new(Arc::new(MarkdownTransform::new()))
    }
}

#[async_trait]
impl Module for RenderMarkdown {
    fn name(&self) -> &str {
        "RenderMarkdown"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        let mut outputs = Vec::with_capacity(inputs.len());
        for doc in inputs {
            let converted = doc
                .content_string()
                .map_err(|e| e.to_string())
                .and_then(|text| self.transform.transform(&text));
            match converted {
                Ok(html) => outputs.push(doc.with_content(html)),
                Err(message) => outputs.extend(malformed(ctx, &doc, message)?),
            }
        }
        Ok(outputs)
    }
}

/// CommonMark to HTML with tables, footnotes and strikethrough.
#[cfg(feature = "markdown")]
#[derive(Debug, Clone, Copy)]
pub struct MarkdownTransform {
    options: pulldown_cmark::Options,
}

#[cfg(feature = "markdown")]
impl MarkdownTransform {
    /// Creates the transform with the common extensions enabled.
    #[must_use]
    pub fn new() -> Self {
        use pulldown_cmark::Options;
        Self {
            options: Options::ENABLE_TABLES
                | Options::ENABLE_FOOTNOTES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_SMART_PUNCTUATION,
        }
    }
}

#[cfg(feature = "markdown")]
impl Default for MarkdownTransform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "markdown")]
impl ContentTransform for MarkdownTransform {
    fn transform(&self, input: &str) -> Result<String, String> {
        let parser = pulldown_cmark::Parser::new_ext(input, self.options);
        let mut html = String::with_capacity(input.len() * 3 / 2);
        pulldown_cmark::html::push_html(&mut html, parser);
        Ok(html)
    }
}
