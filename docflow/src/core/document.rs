//! Immutable, metadata-bearing documents.

use super::keys;
use super::metadata::{Metadata, MetadataAccess};
use super::value::MetadataValue;
use crate::errors::DocflowError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Stable identity of a document, shared by all of its versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Where a document came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// A file, relative to the input root.
    Path(PathBuf),
    /// Fabricated by a module (groups, pages, feeds).
    Synthetic(String),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Synthetic(label) => write!(f, "<{label}>"),
        }
    }
}

/// Produces content bytes on demand.
pub type ContentProducer = Arc<dyn Fn() -> std::io::Result<Vec<u8>> + Send + Sync>;

/// Document payload, either held in memory or produced lazily.
#[derive(Clone, Default)]
pub enum Content {
    /// No content.
    #[default]
    Empty,
    /// In-memory bytes.
    Bytes(Arc<[u8]>),
    /// Read when first requested (e.g. a large asset on disk).
    Producer(ContentProducer),
}

impl Content {
    /// Creates lazily produced content.
    pub fn producer<F>(f: F) -> Self
    where
        F: Fn() -> std::io::Result<Vec<u8>> + Send + Sync + 'static,
    {
        Self::Producer(Arc::new(f))
    }

    /// Returns true when there is no payload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Bytes(bytes) => bytes.is_empty(),
            Self::Producer(_) => false,
        }
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Producer(_) => write!(f, "Producer"),
        }
    }
}

impl From<Vec<u8>> for Content {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value.into())
    }
}

impl From<&[u8]> for Content {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.into())
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Self::Bytes(value.into_bytes().into())
    }
}

impl From<&str> for Content {
    fn from(value: &str) -> Self {
        Self::Bytes(value.as_bytes().into())
    }
}

/// An immutable unit of content plus metadata.
///
/// Every `with_*` method returns a new version sharing unchanged parts with
/// the original. Versions keep the same [`DocumentId`], and equality compares
/// identity only, never content.
#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    source: Arc<Source>,
    destination: Option<PathBuf>,
    content: Content,
    metadata: Metadata,
    children: Arc<Vec<Document>>,
}

impl Document {
    /// Creates an empty document with a fresh identity.
    #[must_use]
    pub fn new(source: Source) -> Self {
        Self {
            id: DocumentId::generate(),
            source: Arc::new(source),
            destination: None,
            content: Content::Empty,
            metadata: Metadata::new(),
            children: Arc::new(Vec::new()),
        }
    }

    /// Creates a document for a source file, seeding path metadata.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let metadata = path_metadata(&path);
        let mut doc = Self::new(Source::Path(path));
        doc.metadata = metadata;
        doc
    }

    /// Creates a module-fabricated document.
    #[must_use]
    pub fn synthetic(label: impl Into<String>) -> Self {
        Self::new(Source::Synthetic(label.into()))
    }

    /// Returns the stable identity.
    #[must_use]
    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Returns the source.
    #[must_use]
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Returns the source path, if the document came from a file.
    #[must_use]
    pub fn source_path(&self) -> Option<&Path> {
        match self.source.as_ref() {
            Source::Path(path) => Some(path),
            Source::Synthetic(_) => None,
        }
    }

    /// Returns the destination path relative to the output root.
    #[must_use]
    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    /// Returns the content.
    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Returns the metadata.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns the child documents (empty for leaves).
    #[must_use]
    pub fn children(&self) -> &[Document] {
        &self.children
    }

    /// Returns the raw metadata value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }

    /// Checks if a metadata key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.metadata.contains_key(key)
    }

    /// Returns a version with `key` set.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// Returns a version with `key` removed.
    #[must_use]
    pub fn without(mut self, key: &str) -> Self {
        self.metadata.remove(key);
        self
    }

    /// Returns a version whose metadata is replaced.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns a version with `overlay` layered over the current metadata.
    #[must_use]
    pub fn with_merged_metadata(mut self, overlay: &Metadata) -> Self {
        self.metadata = self.metadata.merged(overlay);
        self
    }

    /// Returns a version with new content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<Content>) -> Self {
        self.content = content.into();
        self
    }

    /// Returns a version with a new destination.
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Returns a version with the given children.
    #[must_use]
    pub fn with_children(mut self, children: Vec<Document>) -> Self {
        self.children = Arc::new(children);
        self
    }

    /// Merges two documents: `overlay`'s metadata wins, and its content and
    /// children replace `base`'s when non-empty. Identity and destination
    /// come from `base`.
    #[must_use]
    pub fn merged(base: &Self, overlay: &Self) -> Self {
        let mut merged = base.clone().with_merged_metadata(&overlay.metadata);
        if !overlay.content.is_empty() {
            merged.content = overlay.content.clone();
        }
        if !overlay.children.is_empty() {
            merged.children = overlay.children.clone();
        }
        merged
    }

    /// Reads the content bytes, invoking the producer if needed.
    ///
    /// # Errors
    ///
    /// Returns the producer's IO error.
    pub fn content_bytes(&self) -> std::io::Result<Cow<'_, [u8]>> {
        match &self.content {
            Content::Empty => Ok(Cow::Borrowed(&[])),
            Content::Bytes(bytes) => Ok(Cow::Borrowed(bytes)),
            Content::Producer(produce) => produce().map(Cow::Owned),
        }
    }

    /// Reads the content as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns `MalformedContent` for invalid UTF-8 or an IO error from the producer.
    pub fn content_string(&self) -> Result<String, DocflowError> {
        let bytes = self.content_bytes()?;
        String::from_utf8(bytes.into_owned())
            .map_err(|e| DocflowError::malformed(self.source.to_string(), e.to_string()))
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Document {}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl MetadataAccess for Document {
    fn lookup(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }
}

fn path_metadata(path: &Path) -> Metadata {
    let mut metadata = Metadata::new();
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        metadata.insert(keys::SOURCE_FILE_NAME, name);
    }
    if let Some(stem) = path.file_stem().and_then(|n| n.to_str()) {
        metadata.insert(keys::SOURCE_FILE_BASE, stem);
    }
    if let Some(ext) = path.extension().and_then(|n| n.to_str()) {
        metadata.insert(keys::SOURCE_EXTENSION, ext);
    }
    metadata.insert(keys::RELATIVE_PATH, path.to_string_lossy().replace('\\', "/"));
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_from_path_seeds_metadata() {
        let doc = Document::from_path("posts/hello-world.md");
        assert_eq!(doc.get_string(keys::SOURCE_FILE_NAME).unwrap(), "hello-world.md");
        assert_eq!(doc.get_string(keys::SOURCE_FILE_BASE).unwrap(), "hello-world");
        assert_eq!(doc.get_string(keys::SOURCE_EXTENSION).unwrap(), "md");
        assert_eq!(doc.get_string(keys::RELATIVE_PATH).unwrap(), "posts/hello-world.md");
        assert_eq!(doc.source_path(), Some(Path::new("posts/hello-world.md")));
    }

    #[test]
    fn test_with_keeps_identity_and_original() {
        let original = Document::synthetic("test").with("Title", "A");
        let changed = original.clone().with("Title", "B");

        assert_eq!(original, changed);
        assert_eq!(original.get_string("Title").unwrap(), "A");
        assert_eq!(changed.get_string("Title").unwrap(), "B");
    }

    #[test]
    fn test_distinct_documents_differ() {
        let a = Document::synthetic("x");
        let b = Document::synthetic("x");
        assert_ne!(a, b);
    }

    #[test]
    fn test_content_string() {
        let doc = Document::synthetic("t").with_content("hello");
        assert_eq!(doc.content_string().unwrap(), "hello");

        let invalid = Document::synthetic("t").with_content(vec![0xff, 0xfe]);
        assert!(matches!(
            invalid.content_string(),
            Err(DocflowError::MalformedContent { .. })
        ));
    }

    #[test]
    fn test_producer_is_lazy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let doc = Document::synthetic("lazy").with_content(Content::producer(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(b"payload".to_vec())
        }));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(doc.content_bytes().unwrap().as_ref(), b"payload");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_merged_prefers_overlay_metadata_and_content() {
        let scaffold = Document::synthetic("scaffold")
            .with("layout", "tag")
            .with_content("<template>");
        let group = Document::synthetic("group")
            .with(keys::GROUP_KEY, "go")
            .with_children(vec![Document::synthetic("post")]);

        let merged = Document::merged(&group, &scaffold);
        assert_eq!(merged, group);
        assert_eq!(merged.get_string("layout").unwrap(), "tag");
        assert_eq!(merged.get_string(keys::GROUP_KEY).unwrap(), "go");
        assert_eq!(merged.children().len(), 1);
        assert_eq!(merged.content_string().unwrap(), "<template>");
    }

    #[test]
    fn test_children_default_empty() {
        let doc = Document::synthetic("leaf");
        assert!(doc.children().is_empty());
        assert!(doc.destination().is_none());
    }
}
