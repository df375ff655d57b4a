//! Syndication feed generation.

use super::{malformed, Module};
use crate::context::ExecutionContext;
use crate::core::{keys, Document, MetadataAccess};
use crate::errors::{DocflowError, MetadataResultExt};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::cmp::Reverse;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_MAX_ITEMS: usize = 20;

/// Feed-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedMetadata {
    /// Feed title.
    pub title: String,
    /// Feed description.
    pub description: Option<String>,
    /// Feed author.
    pub author: Option<String>,
    /// Copyright notice.
    pub copyright: Option<String>,
    /// Link to the site home page.
    pub link: Option<String>,
}

/// One entry of a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    /// Stable identifier: the item link, or the source when unlinked.
    pub id: String,
    /// Item title.
    pub title: String,
    /// Link to the rendered page.
    pub link: Option<String>,
    /// Publication date.
    pub published: Option<DateTime<FixedOffset>>,
    /// The `Excerpt`, if any.
    pub summary: Option<String>,
    /// Rendered content.
    pub content: Option<String>,
}

/// A serialized feed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedArtifact {
    /// Output path relative to the output root.
    pub path: PathBuf,
    /// Encoded feed.
    pub bytes: Vec<u8>,
}

/// Turns feed items into one or more files (Atom, RSS, JSON Feed...).
pub trait FeedSerializer: Send + Sync + Debug {
    /// Serializes items, which arrive newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed cannot be encoded.
    fn serialize(
        &self,
        feed: &FeedMetadata,
        items: &[FeedItem],
    ) -> Result<Vec<FeedArtifact>, DocflowError>;
}

/// Replaces the stream with feed documents, one per serialized artifact.
///
/// Items are ordered by `Published`, newest first; the sort is stable and
/// undated documents come last. Feed metadata not set on the module falls
/// back to the global `Title`, `Description`, `Author` and `Copyright`
/// settings.
#[derive(Debug, Clone)]
pub struct GenerateFeeds {
    serializer: Arc<dyn FeedSerializer>,
    title: Option<String>,
    description: Option<String>,
    author: Option<String>,
    copyright: Option<String>,
    max_items: usize,
}

impl GenerateFeeds {
    /// Creates the module.
    #[must_use]
    pub fn new(serializer: Arc<dyn FeedSerializer>) -> Self {
        Self {
            serializer,
            title: None,
            description: None,
            author: None,
            copyright: None,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }

    /// Sets the feed title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the feed description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the feed author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Sets the copyright notice.
    #[must_use]
    pub fn with_copyright(mut self, copyright: impl Into<String>) -> Self {
        self.copyright = Some(copyright.into());
        self
    }

    /// Caps the number of items. Defaults to 20.
    #[must_use]
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    fn feed_metadata(&self, ctx: &ExecutionContext) -> Result<FeedMetadata, DocflowError> {
        let settings = ctx.settings();
        let pick = |own: &Option<String>, key: &str| -> Result<Option<String>, DocflowError> {
            match own {
                Some(value) => Ok(Some(value.clone())),
                None => Ok(settings.get_string(key).optional()?),
            }
        };
        Ok(FeedMetadata {
            title: pick(&self.title, keys::TITLE)?.unwrap_or_default(),
            description: pick(&self.description, keys::DESCRIPTION)?,
            author: pick(&self.author, keys::AUTHOR)?,
            copyright: pick(&self.copyright, keys::COPYRIGHT)?,
            link: Some(ctx.link_for_path(Path::new("index.html"))),
        })
    }
}

/// Builds one item, or `None` when unreadable content is skipped.
fn feed_item(doc: &Document, ctx: &ExecutionContext) -> Result<Option<FeedItem>, DocflowError> {
    let link = ctx.link_for(doc).ok();
    let content = match doc.content_string() {
        Ok(text) => Some(text).filter(|text| !text.is_empty()),
        Err(err) => {
            malformed(ctx, doc, err.to_string())?;
            return Ok(None);
        }
    };
    Ok(Some(FeedItem {
        id: link.clone().unwrap_or_else(|| doc.source().to_string()),
        title: doc.get_string(keys::TITLE).optional()?.unwrap_or_default(),
        link,
        published: doc.get_datetime(keys::PUBLISHED).optional()?,
        summary: doc.get_string(keys::EXCERPT).optional()?,
        content,
    }))
}

#[async_trait]
impl Module for GenerateFeeds {
    fn name(&self) -> &str {
        "GenerateFeeds"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        let mut items = Vec::with_capacity(inputs.len());
        for doc in &inputs {
            items.extend(feed_item(doc, ctx)?);
        }
        items.sort_by_key(|item| (item.published.is_none(), Reverse(item.published)));
        items.truncate(self.max_items);

        let feed = self.feed_metadata(ctx)?;
        let artifacts = self.serializer.serialize(&feed, &items)?;
        Ok(artifacts
            .into_iter()
            .map(|artifact| {
                Document::synthetic("feed")
                    .with(keys::TITLE, feed.title.clone())
                    .with_destination(artifact.path)
                    .with_content(artifact.bytes)
            })
            .collect())
    }
}

/// Writes a JSON Feed 1.1 document.
#[derive(Debug, Clone)]
pub struct JsonFeedSerializer {
    path: PathBuf,
}

impl Default for JsonFeedSerializer {
    fn default() -> Self {
        Self {
            path: PathBuf::from("feed.json"),
        }
    }
}

impl JsonFeedSerializer {
    /// Writes to `feed.json`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes to another path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }
}

#[derive(Serialize)]
struct JsonFeed<'a> {
    version: &'static str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    home_page_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    authors: Vec<JsonFeedAuthor<'a>>,
    items: Vec<JsonFeedItem<'a>>,
}

#[derive(Serialize)]
struct JsonFeedAuthor<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct JsonFeedItem<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_html: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_published: Option<String>,
}

impl FeedSerializer for JsonFeedSerializer {
    fn serialize(
        &self,
        feed: &FeedMetadata,
        items: &[FeedItem],
    ) -> Result<Vec<FeedArtifact>, DocflowError> {
        let document = JsonFeed {
            version: "https://jsonfeed.org/version/1.1",
            title: &feed.title,
            home_page_url: feed.link.as_deref(),
            description: feed.description.as_deref(),
            authors: feed
                .author
                .as_deref()
                .map(|name| vec![JsonFeedAuthor { name }])
                .unwrap_or_default(),
            items: items
                .iter()
                .map(|item| JsonFeedItem {
                    id: &item.id,
                    url: item.link.as_deref(),
                    title: &item.title,
                    summary: item.summary.as_deref(),
                    content_html: item.content.as_deref(),
                    date_published: item.published.map(|d| d.to_rfc3339()),
                })
                .collect(),
        };
        let bytes = serde_json::to_vec_pretty(&document)
            .map_err(|e| DocflowError::module("JsonFeedSerializer", e.to_string()))?;
        Ok(vec![FeedArtifact {
            path: self.path.clone(),
            bytes,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::testing::{doc, post, TestRun};
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default)]
    struct Capture(parking_lot::Mutex<Vec<(FeedMetadata, Vec<FeedItem>)>>);

    impl FeedSerializer for Capture {
        fn serialize(
            &self,
            feed: &FeedMetadata,
            items: &[FeedItem],
        ) -> Result<Vec<FeedArtifact>, DocflowError> {
            self.0.lock().push((feed.clone(), items.to_vec()));
            Ok(vec![
                FeedArtifact {
                    path: "feed.atom".into(),
                    bytes: b"atom".to_vec(),
                },
                FeedArtifact {
                    path: "feed.rss".into(),
                    bytes: b"rss".to_vec(),
                },
            ])
        }
    }

    #[tokio::test]
    async fn test_items_newest_first_with_settings_fallback() {
        let ctx = TestRun::new()
            .with_settings(Settings::new().with(keys::TITLE, "Blog").with(keys::AUTHOR, "Site"))
            .context("Feeds");
        let capture = Arc::new(Capture::default());
        let docs = vec![
            post("Old", "2019-01-01", &[]),
            doc("Undated"),
            post("New", "2021-01-01", &[]),
            post("Mid", "2020-01-01", &[]),
        ];

        let out = GenerateFeeds::new(capture.clone())
            .with_author("Override")
            .with_max_items(3)
            .execute(docs, &ctx)
            .await
            .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].destination(), Some(Path::new("feed.atom")));
        assert_eq!(out[1].content_string().unwrap(), "rss");

        let calls = capture.0.lock();
        let (feed, items) = &calls[0];
        assert_eq!(feed.title, "Blog");
        assert_eq!(feed.author.as_deref(), Some("Override"));
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["New", "Mid", "Old"]);
    }

    #[tokio::test]
    async fn test_unreadable_content_is_malformed() {
        let unreadable = || post("Broken", "2020-01-01", &[]).with_content(vec![0xff, 0xfe]);
        let capture = Arc::new(Capture::default());

        let err = GenerateFeeds::new(capture.clone())
            .execute(vec![unreadable()], &TestRun::new().context("Feeds"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::MalformedContent);
        assert!(capture.0.lock().is_empty());

        let lenient = TestRun::new()
            .with_settings(Settings::new().with_engine(
                crate::config::EngineConfig::new().with_skip_malformed_content(true),
            ))
            .context("Feeds");
        GenerateFeeds::new(capture.clone())
            .execute(vec![unreadable(), post("Fine", "2021-01-01", &[])], &lenient)
            .await
            .unwrap();
        let calls = capture.0.lock();
        let titles: Vec<_> = calls[0].1.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Fine"]);
    }

    #[test]
    fn test_json_feed_shape() {
        let feed = FeedMetadata {
            title: "Blog".into(),
            author: Some("Me".into()),
            link: Some("/".into()),
            ..FeedMetadata::default()
        };
        let items = vec![FeedItem {
            id: "/posts/a.html".into(),
            title: "A".into(),
            link: Some("/posts/a.html".into()),
            published: crate::core::time::parse_datetime("2020-01-02").ok(),
            summary: None,
            content: Some("<p>x</p>".into()),
        }];
        let artifacts = JsonFeedSerializer::new().serialize(&feed, &items).unwrap();
        assert_eq!(artifacts[0].path, PathBuf::from("feed.json"));

        let json: serde_json::Value = serde_json::from_slice(&artifacts[0].bytes).unwrap();
        assert_eq!(json["version"], "https://jsonfeed.org/version/1.1");
        assert_eq!(json["authors"][0]["name"], "Me");
        assert_eq!(json["items"][0]["url"], "/posts/a.html");
        assert_eq!(json["items"][0]["date_published"], "2020-01-02T00:00:00+00:00");
        assert!(json["items"][0].get("summary").is_none());
    }
}
