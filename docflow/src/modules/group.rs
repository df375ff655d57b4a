//! Partitioning a stream into one parent document per key.

use super::{DocumentFn, Module};
use crate::context::ExecutionContext;
use crate::core::{keys, Document, MetadataValue};
use crate::errors::{DocflowError, MetadataError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

enum KeySource {
    Metadata(String),
    Computed(DocumentFn<Vec<MetadataValue>>),
}

/// Groups documents by the distinct values of a key.
///
/// A list-valued key puts the document in one group per element. Each group
/// becomes a synthetic document whose children are its members in input
/// order and whose `GroupKey` holds the value as first seen. Groups are
/// emitted in order of first appearance; documents without the key belong
/// to no group.
pub struct GroupDocuments {
    source: KeySource,
    ignore_case: bool,
}

impl GroupDocuments {
    /// Groups by a metadata key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            source: KeySource::Metadata(key.into()),
            ignore_case: false,
        }
    }

    /// Groups by computed keys. An empty result excludes the document.
    pub fn by<F>(selector: F) -> Self
    where
        F: Fn(&Document, &ExecutionContext) -> Result<Vec<MetadataValue>, DocflowError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            source: KeySource::Computed(Arc::new(selector)),
            ignore_case: false,
        }
    }

    /// Treats keys differing only in case as the same group.
    #[must_use]
    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    fn keys_of(
        &self,
        doc: &Document,
        ctx: &ExecutionContext,
    ) -> Result<Vec<MetadataValue>, DocflowError> {
        match &self.source {
            KeySource::Computed(selector) => selector(doc, ctx),
            KeySource::Metadata(key) => Ok(match doc.get(key) {
                None => Vec::new(),
                Some(MetadataValue::List(items)) => items.clone(),
                Some(value) => vec![value.clone()],
            }),
        }
    }

    fn label(&self) -> &str {
        match &self.source {
            KeySource::Metadata(key) => key,
            KeySource::Computed(_) => "<computed>",
        }
    }

    fn fold(&self, value: &MetadataValue) -> Result<String, MetadataError> {
        let text = value
            .to_text()
            .ok_or_else(|| MetadataError::mismatch(self.label(), "string", value.type_name()))?;
        Ok(if self.ignore_case {
            text.to_lowercase()
        } else {
            text
        })
    }
}

impl fmt::Debug for GroupDocuments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupDocuments")
            .field("key", &self.label())
            .field("ignore_case", &self.ignore_case)
            .finish()
    }
}

#[async_trait]
impl Module for GroupDocuments {
    fn name(&self) -> &str {
        "GroupDocuments"
    }

    async fn execute(
        &self,
        inputs: Vec<Document>,
        ctx: &ExecutionContext,
    ) -> Result<Vec<Document>, DocflowError> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<(MetadataValue, Vec<Document>)> = Vec::new();

        for doc in &inputs {
            let mut seen = Vec::new();
            for value in self.keys_of(doc, ctx)? {
                let folded = self.fold(&value)?;
                if seen.contains(&folded) {
                    continue;
                }
                let slot = *index.entry(folded.clone()).or_insert_with(|| {
                    groups.push((value.clone(), Vec::new()));
                    groups.len() - 1
                });
                groups[slot].1.push(doc.clone());
                seen.push(folded);
            }
        }

        Ok(groups
            .into_iter()
            .map(|(key, members)| {
                Document::synthetic("group")
                    .with(keys::GROUP_KEY, key)
                    .with_children(members)
            })
            .collect())
    }
}
