//! Typed metadata values.

use super::time::parse_datetime;
use super::Document;
use chrono::{DateTime, FixedOffset, Utc};
use std::cmp::Ordering;

/// A value stored under a metadata key.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    /// Text.
    String(String),
    /// Any number.
    Number(f64),
    /// A boolean flag.
    Bool(bool),
    /// A point in time.
    DateTime(DateTime<FixedOffset>),
    /// An ordered list of values (e.g. tags).
    List(Vec<MetadataValue>),
    /// Nested documents.
    Documents(Vec<Document>),
    /// Anything else, kept as JSON.
    Object(serde_json::Value),
}

impl MetadataValue {
    /// Returns a short name of the variant, used in type mismatch errors.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Bool(_) => "bool",
            Self::DateTime(_) => "datetime",
            Self::List(_) => "list",
            Self::Documents(_) => "documents",
            Self::Object(_) => "object",
        }
    }

    /// Borrows the value as a string slice when it is stored as text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Coerces scalars to text.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Number(n) => Some(format_number(*n)),
            Self::Bool(b) => Some(b.to_string()),
            Self::DateTime(dt) => Some(dt.to_rfc3339()),
            Self::Object(serde_json::Value::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// Coerces to a number; text is parsed.
    #[must_use]
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(s) => s.trim().parse().ok(),
            Self::Object(value) => value.as_f64(),
            _ => None,
        }
    }

    /// Coerces to a boolean; `"true"`/`"false"` text is accepted.
    #[must_use]
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::String(s) => s.trim().parse().ok(),
            Self::Object(value) => value.as_bool(),
            _ => None,
        }
    }

    /// Coerces to a datetime; text is parsed.
    #[must_use]
    pub fn to_datetime(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            Self::String(s) => parse_datetime(s).ok(),
            _ => None,
        }
    }

    /// Converts a JSON value; arrays become lists and objects stay opaque.
    #[must_use]
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or_else(
                || Self::Object(serde_json::Value::Number(n)),
                Self::Number,
            ),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from_json).collect())
            }
            other => Self::Object(other),
        }
    }

    /// Converts to JSON; nested documents become their metadata objects.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Documents(docs) => {
                serde_json::Value::Array(docs.iter().map(|d| d.metadata().to_json()).collect())
            }
            Self::Object(value) => value.clone(),
        }
    }

    /// Total order used for sorting: values of the same kind compare
    /// naturally, different kinds by a fixed kind rank.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::DateTime(a), Self::DateTime(b)) => a.cmp(b),
            (Self::List(a), Self::List(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| x.compare(y))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Self::Documents(a), Self::Documents(b)) => a.len().cmp(&b.len()),
            (Self::Object(a), Self::Object(b)) => a.to_string().cmp(&b.to_string()),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Number(_) => 1,
            Self::DateTime(_) => 2,
            Self::String(_) => 3,
            Self::List(_) => 4,
            Self::Documents(_) => 5,
            Self::Object(_) => 6,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for MetadataValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<usize> for MetadataValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<DateTime<FixedOffset>> for MetadataValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::DateTime(value)
    }
}

impl From<DateTime<Utc>> for MetadataValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value.fixed_offset())
    }
}

impl From<Vec<Document>> for MetadataValue {
    fn from(value: Vec<Document>) -> Self {
        Self::Documents(value)
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value.into_iter().map(Self::String).collect())
    }
}

impl From<Vec<&str>> for MetadataValue {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(Self::from).collect())
    }
}

impl From<serde_json::Value> for MetadataValue {
    fn from(value: serde_json::Value) -> Self {
        Self::from_json(value)
    }
}

/// Types that can be read out of a metadata value by the typed accessors.
pub trait FromMetadata: Sized {
    /// Name used in type mismatch errors.
    const TYPE_NAME: &'static str;

    /// Coerces a stored value.
    fn from_metadata(value: &MetadataValue) -> Option<Self>;

    /// Coerces a nested document (list elements of `Documents` values).
    fn from_document(_doc: &Document) -> Option<Self> {
        None
    }
}

impl FromMetadata for String {
    const TYPE_NAME: &'static str = "string";

    fn from_metadata(value: &MetadataValue) -> Option<Self> {
        value.to_text()
    }
}

impl FromMetadata for f64 {
    const TYPE_NAME: &'static str = "number";

    fn from_metadata(value: &MetadataValue) -> Option<Self> {
        value.to_number()
    }
}

impl FromMetadata for i64 {
    const TYPE_NAME: &'static str = "integer";

    #[allow(clippy::cast_possible_truncation)]
    fn from_metadata(value: &MetadataValue) -> Option<Self> {
        value
            .to_number()
            .filter(|n| n.fract() == 0.0)
            .map(|n| n as Self)
    }
}

impl FromMetadata for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_metadata(value: &MetadataValue) -> Option<Self> {
        value.to_bool()
    }
}

impl FromMetadata for DateTime<FixedOffset> {
    const TYPE_NAME: &'static str = "datetime";

    fn from_metadata(value: &MetadataValue) -> Option<Self> {
        value.to_datetime()
    }
}

impl FromMetadata for Document {
    const TYPE_NAME: &'static str = "document";

    fn from_metadata(value: &MetadataValue) -> Option<Self> {
        match value {
            MetadataValue::Documents(docs) if docs.len() == 1 => docs.first().cloned(),
            _ => None,
        }
    }

    fn from_document(doc: &Document) -> Option<Self> {
        Some(doc.clone())
    }
}

impl FromMetadata for MetadataValue {
    const TYPE_NAME: &'static str = "value";

    fn from_metadata(value: &MetadataValue) -> Option<Self> {
        Some(value.clone())
    }

    fn from_document(doc: &Document) -> Option<Self> {
        Some(Self::Documents(vec![doc.clone()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_text_coercion() {
        assert_eq!(MetadataValue::from(3.0).to_text(), Some("3".to_string()));
        assert_eq!(MetadataValue::from(2.5).to_text(), Some("2.5".to_string()));
        assert_eq!(MetadataValue::from(true).to_text(), Some("true".to_string()));
        assert_eq!(MetadataValue::List(vec![]).to_text(), None);
    }

    #[test]
    fn test_datetime_coercion() {
        let value = MetadataValue::from("2020-01-15");
        assert_eq!(value.to_datetime().map(|d| d.year()), Some(2020));
        assert!(MetadataValue::from("soon").to_datetime().is_none());
        assert!(MetadataValue::from(12.0).to_datetime().is_none());
    }

    #[test]
    fn test_from_json() {
        let value = MetadataValue::from_json(serde_json::json!(["a", 1, true]));
        assert_eq!(
            value,
            MetadataValue::List(vec![
                MetadataValue::from("a"),
                MetadataValue::Number(1.0),
                MetadataValue::Bool(true),
            ])
        );

        let object = MetadataValue::from_json(serde_json::json!({"k": "v"}));
        assert_eq!(object.type_name(), "object");
    }

    #[test]
    fn test_to_json_round_trip_scalars() {
        let value = MetadataValue::from(vec!["x", "y"]);
        assert_eq!(value.to_json(), serde_json::json!(["x", "y"]));
    }

    #[test]
    fn test_compare_same_kind() {
        assert!(MetadataValue::from("a").compare(&MetadataValue::from("b")).is_lt());
        assert!(MetadataValue::from(10.0).compare(&MetadataValue::from(2.0)).is_gt());
        assert!(MetadataValue::from(vec!["a"])
            .compare(&MetadataValue::from(vec!["a", "b"]))
            .is_lt());
    }

    #[test]
    fn test_compare_mixed_kinds_is_total() {
        let number = MetadataValue::from(1.0);
        let text = MetadataValue::from("1");
        assert_eq!(number.compare(&text), text.compare(&number).reverse());
    }

    #[test]
    fn test_integer_from_metadata() {
        assert_eq!(i64::from_metadata(&MetadataValue::from("25")), Some(25));
        assert_eq!(i64::from_metadata(&MetadataValue::from(2.5)), None);
    }
}
