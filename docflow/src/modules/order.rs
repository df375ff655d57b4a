//! Stable multi-key sorting.

use super::Module;
use crate::context::ExecutionContext;
use crate::core::{Document, MetadataAccess, MetadataValue};
use crate::errors::{DocflowError, MetadataResultExt};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

type SortKeyFn =
    Arc<dyn Fn(&Document, &ExecutionContext) -> Result<Option<MetadataValue>, DocflowError> + Send + Sync>;

struct SortKey {
    selector: SortKeyFn,
    descending: bool,
}

/// Sorts the stream by one or more keys.
///
/// The sort is stable: documents with equal keys keep their input order.
/// Documents without a value sort before all others in ascending order.
pub struct OrderDocuments {
    keys: Vec<SortKey>,
}

impl OrderDocuments {
    /// Orders by a computed key; `None` means "no value".
    pub fn by<F>(selector: F) -> Self
    where
        F: Fn(&Document, &ExecutionContext) -> Result<Option<MetadataValue>, DocflowError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            keys: vec![SortKey {
                selector: Arc::new(selector),
                descending: false,
            }],
        }
    }

    /// Orders by the raw value of a metadata key.
    #[must_use]
    pub fn by_key(key: impl Into<String>) -> Self {
        Self::by(raw_key(key.into()))
    }

    /// Orders by a metadata key coerced to a datetime.
    ///
    /// Values that are present but not datetimes fail the module.
    #[must_use]
    pub fn by_datetime(key: impl Into<String>) -> Self {
        Self::by(datetime_key(key.into()))
    }

    /// Adds a secondary key used when earlier keys tie.
    #[must_use]
    pub fn then_by<F>(mut self, selector: F) -> Self
    where
        F: Fn(&Document, &ExecutionContext) -> Result<Option<MetadataValue>, DocflowError>
            + Send
            + Sync
            + 'static,
    {
        self.keys.push(SortKey {
            selector: Arc::new(selector),
            descending: false,
        });
        self
    }

    /// Adds a secondary metadata key.
    #[must_use]
    pub fn then_by_key(self, key: impl Into<String>) -> Self {
        self.then_by(raw_key(key.into()))
    }

    /// Reverses the most recently added key.
    #[must_use]
    pub fn descending(mut self) -> Self {
        if let Some(last) = self.keys.last_mut() {
            last.descending = true;
        }
        self
    }
}

fn raw_key(
    key: String,
) -> impl Fn(&Document, &ExecutionContext) -> Result<Option<MetadataValue>, DocflowError> {
    move |doc, _| Ok(doc.get(&key).cloned())
}

fn datetime_key(
    key: String,
) -> impl Fn(&Document, &ExecutionContext) -> Result<Option<MetadataValue>, DocflowError> {
    move |doc, _| Ok(doc.get_datetime(&key).optional()?.map(MetadataValue::DateTime))
}

fn compare_values(a: Option<&MetadataValue>, b: Option<&MetadataValue>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.compare(b),
    }
}

impl fmt::Debug for OrderDocuments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let directions: Vec<_> = self.keys.iter().map(|k| k.descending).collect();
        f.debug_struct("OrderDocuments")
            .field("descending", &directions)
            .finish()
    }
}

#[async_trait]
impl Module for OrderDocuments {
    fn name(&self) -> &str {
        "OrderDocuments"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        let mut keyed = Vec::with_capacity(inputs.len());
        for doc in inputs {
            let values = self
                .keys
                .iter()
                .map(|key| (key.selector)(&doc, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            keyed.push((values, doc));
        }

        keyed.sort_by(|(a, _), (b, _)| {
            self.keys
                .iter()
                .zip(a.iter().zip(b.iter()))
                .map(|(key, (x, y))| {
                    let ordering = compare_values(x.as_ref(), y.as_ref());
                    if key.descending {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                })
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });

        Ok(keyed.into_iter().map(|(_, doc)| doc).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::keys;
    use crate::errors::MetadataError;
    use crate::testing::{assert_titles, doc, post, test_context};

    #[tokio::test]
    async fn test_datetime_descending_is_stable() {
        let docs = vec![
            post("Old", "2019-01-01", &[]),
            post("First of day", "2020-05-01", &[]),
            post("Second of day", "2020-05-01", &[]),
            post("Newest", "2021-02-03", &[]),
        ];
        let out = OrderDocuments::by_datetime(keys::PUBLISHED)
            .descending()
            .execute(docs, &test_context("Feed"))
            .await
            .unwrap();
        assert_titles(&out, &["Newest", "First of day", "Second of day", "Old"]);
    }

    #[tokio::test]
    async fn test_missing_values_sort_first_ascending() {
        let docs = vec![doc("B").with("rank", 2.0), doc("none"), doc("A").with("rank", 1.0)];
        let out = OrderDocuments::by_key("rank")
            .execute(docs, &test_context("Posts"))
            .await
            .unwrap();
        assert_titles(&out, &["none", "A", "B"]);
    }

    #[tokio::test]
    async fn test_count_desc_then_name() {
        let tag = |name: &str, count: usize| {
            doc(name)
                .with(keys::GROUP_KEY, name)
                .with_children((0..count).map(|i| doc(&i.to_string())).collect())
        };
        let docs = vec![tag("web", 1), tag("rust", 3), tag("go", 3), tag("ai", 1)];

        let out = OrderDocuments::by(|d, _| Ok(Some(d.children().len().into())))
            .descending()
            .then_by_key(keys::GROUP_KEY)
            .execute(docs, &test_context("Index"))
            .await
            .unwrap();
        assert_titles(&out, &["go", "rust", "ai", "web"]);
    }

    #[tokio::test]
    async fn test_bad_datetime_fails() {
        let docs = vec![doc("A").with(keys::PUBLISHED, "someday")];
        let err = OrderDocuments::by_datetime(keys::PUBLISHED)
            .execute(docs, &test_context("Feed"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DocflowError::Metadata(MetadataError::TypeMismatch { .. })
        ));
    }
}
