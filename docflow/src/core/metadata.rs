//! Ordered metadata store, typed accessors and scoped lookups.

use super::value::{FromMetadata, MetadataValue};
use super::Document;
use crate::errors::MetadataError;
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;

/// An ordered key/value mapping with copy-on-write storage.
///
/// Cloning is cheap; the entries are shared until one of the copies is
/// modified. Keys keep their first insertion position when overwritten.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: Arc<Vec<(String, MetadataValue)>>,
}

impl Metadata {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Sets a value, replacing any previous value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        let key = key.into();
        let value = value.into();
        let entries = Arc::make_mut(&mut self.entries);

        if let Some(slot) = entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            entries.push((key, value));
        }
    }

    /// Returns a new store with the value set.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Removes a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<MetadataValue> {
        let position = self.entries.iter().position(|(k, _)| k == key)?;
        Some(Arc::make_mut(&mut self.entries).remove(position).1)
    }

    /// Returns a new store layered with `overlay`; overlay values win.
    #[must_use]
    pub fn merged(&self, overlay: &Self) -> Self {
        let mut merged = self.clone();
        for (key, value) in overlay.iter() {
            merged.insert(key, value.clone());
        }
        merged
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Builds a store from a JSON object in the map's iteration order.
    #[must_use]
    pub fn from_json_object(object: serde_json::Map<String, serde_json::Value>) -> Self {
        object
            .into_iter()
            .map(|(k, v)| (k, MetadataValue::from_json(v)))
            .collect()
    }

    /// Converts to a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl<K, V> FromIterator<(K, V)> for Metadata
where
    K: Into<String>,
    V: Into<MetadataValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Self::new();
        for (key, value) in iter {
            metadata.insert(key, value);
        }
        metadata
    }
}

/// Typed, fallible access to metadata.
///
/// Absent keys yield `MetadataError::NotFound`; values that cannot be
/// coerced yield `MetadataError::TypeMismatch`.
pub trait MetadataAccess {
    /// Looks up the raw value for `key`.
    fn lookup(&self, key: &str) -> Option<&MetadataValue>;

    /// Returns the raw value or `NotFound`.
    fn require(&self, key: &str) -> Result<&MetadataValue, MetadataError> {
        self.lookup(key).ok_or_else(|| MetadataError::not_found(key))
    }

    /// Reads and coerces a value.
    fn get_as<T: FromMetadata>(&self, key: &str) -> Result<T, MetadataError> {
        let value = self.require(key)?;
        T::from_metadata(value)
            .ok_or_else(|| MetadataError::mismatch(key, T::TYPE_NAME, value.type_name()))
    }

    /// Reads a string.
    fn get_string(&self, key: &str) -> Result<String, MetadataError> {
        self.get_as(key)
    }

    /// Reads a string, using `fallback` only when the key is absent.
    fn get_string_or(&self, key: &str, fallback: &str) -> Result<String, MetadataError> {
        match self.lookup(key) {
            None => Ok(fallback.to_string()),
            Some(_) => self.get_string(key),
        }
    }

    /// Reads a number.
    fn get_number(&self, key: &str) -> Result<f64, MetadataError> {
        self.get_as(key)
    }

    /// Reads a boolean.
    fn get_bool(&self, key: &str) -> Result<bool, MetadataError> {
        self.get_as(key)
    }

    /// Reads a datetime.
    fn get_datetime(&self, key: &str) -> Result<DateTime<FixedOffset>, MetadataError> {
        self.get_as(key)
    }

    /// Reads a list. A single scalar is returned as a one-element list.
    fn get_list<T: FromMetadata>(&self, key: &str) -> Result<Vec<T>, MetadataError> {
        let value = self.require(key)?;
        let mismatch = |found: &'static str| MetadataError::mismatch(key, T::TYPE_NAME, found);

        match value {
            MetadataValue::List(items) => items
                .iter()
                .map(|item| T::from_metadata(item).ok_or_else(|| mismatch(item.type_name())))
                .collect(),
            MetadataValue::Documents(docs) => docs
                .iter()
                .map(|doc| T::from_document(doc).ok_or_else(|| mismatch("document")))
                .collect(),
            scalar => T::from_metadata(scalar)
                .map(|v| vec![v])
                .ok_or_else(|| mismatch(scalar.type_name())),
        }
    }

    /// Reads nested documents.
    fn get_documents(&self, key: &str) -> Result<Vec<Document>, MetadataError> {
        self.get_list(key)
    }
}

impl MetadataAccess for Metadata {
    fn lookup(&self, key: &str) -> Option<&MetadataValue> {
        self.get(key)
    }
}

/// A lookup chain: the first layer holding a key wins.
///
/// Built by the execution context as document → pipeline → global settings.
#[derive(Debug, Clone, Default)]
pub struct MetadataScope<'a> {
    layers: Vec<&'a Metadata>,
}

impl<'a> MetadataScope<'a> {
    /// Creates an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a lower-priority layer.
    #[must_use]
    pub fn then(mut self, layer: &'a Metadata) -> Self {
        self.layers.push(layer);
        self
    }

    /// Returns the number of layers.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

impl MetadataAccess for MetadataScope<'_> {
    fn lookup(&self, key: &str) -> Option<&MetadataValue> {
        self.layers.iter().find_map(|layer| layer.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MetadataResultExt;
    use pretty_assertions::assert_eq;

    fn sample() -> Metadata {
        Metadata::new()
            .with("Title", "Hello")
            .with("Tags", vec!["rust", "web"])
            .with("Published", "2020-05-01")
            .with("Draft", false)
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let metadata = sample().with("Title", "Replaced");
        let keys: Vec<_> = metadata.keys().collect();
        assert_eq!(keys, vec!["Title", "Tags", "Published", "Draft"]);
        assert_eq!(metadata.get_string("Title").unwrap(), "Replaced");
    }

    #[test]
    fn test_copy_on_write() {
        let original = sample();
        let changed = original.clone().with("Title", "Other");
        assert_eq!(original.get_string("Title").unwrap(), "Hello");
        assert_eq!(changed.get_string("Title").unwrap(), "Other");
    }

    #[test]
    fn test_not_found_vs_mismatch() {
        let metadata = sample();
        assert_eq!(
            metadata.get_string("Missing"),
            Err(MetadataError::not_found("Missing"))
        );
        assert!(matches!(
            metadata.get_datetime("Title"),
            Err(MetadataError::TypeMismatch { expected: "datetime", .. })
        ));
        assert_eq!(metadata.get_string("Missing").optional(), Ok(None));
    }

    #[test]
    fn test_get_list_scalar_and_list() {
        let metadata = sample().with("Single", "only");
        assert_eq!(metadata.get_list::<String>("Tags").unwrap(), vec!["rust", "web"]);
        assert_eq!(metadata.get_list::<String>("Single").unwrap(), vec!["only"]);
        assert!(metadata.get_list::<f64>("Tags").is_err());
    }

    #[test]
    fn test_get_string_or_only_covers_absent() {
        let metadata = Metadata::new().with("Nested", MetadataValue::Documents(vec![]));
        assert_eq!(metadata.get_string_or("Missing", "x").unwrap(), "x");
        assert!(metadata.get_string_or("Nested", "x").is_err());
    }

    #[test]
    fn test_remove_and_merge() {
        let mut metadata = sample();
        assert!(metadata.remove("Draft").is_some());
        assert!(!metadata.contains_key("Draft"));

        let merged = metadata.merged(&Metadata::new().with("Title", "Overlay").with("New", 1.0));
        assert_eq!(merged.get_string("Title").unwrap(), "Overlay");
        assert_eq!(merged.get_number("New").unwrap(), 1.0);
        assert_eq!(merged.len(), 4);
    }

    #[test]
    fn test_scope_fallback_chain() {
        let document = Metadata::new().with("Title", "Doc");
        let pipeline = Metadata::new().with("Title", "Pipeline").with("Layout", "post");
        let global = Metadata::new().with("Author", "Site Owner");

        let scope = MetadataScope::new().then(&document).then(&pipeline).then(&global);
        assert_eq!(scope.depth(), 3);
        assert_eq!(scope.get_string("Title").unwrap(), "Doc");
        assert_eq!(scope.get_string("Layout").unwrap(), "post");
        assert_eq!(scope.get_string("Author").unwrap(), "Site Owner");
        assert!(scope.get_string("Nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_json_conversion() {
        let object = serde_json::json!({"b": 1, "a": "x"});
        let serde_json::Value::Object(map) = object else {
            unreachable!()
        };
        let metadata = Metadata::from_json_object(map);
        assert_eq!(metadata.get_number("b").unwrap(), 1.0);
        assert_eq!(metadata.to_json()["a"], serde_json::json!("x"));
    }
}
