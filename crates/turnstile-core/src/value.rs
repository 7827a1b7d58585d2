//! Field values and documents.
//!
//! A [`Document`] is the unit of storage: an ordered map from field name to
//! [`Value`], serialized to JSON inside the record envelope. Values are
//! tagged so calendar days, timestamps, and references survive round-trips
//! unambiguously.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::RecordId;

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Explicit null (unset).
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 text. Password fields hold the PHC hash string, never plaintext.
    Text(String),
    /// Calendar date without a time component.
    CalendarDay(NaiveDate),
    /// UTC timestamp.
    Timestamp(DateTime<Utc>),
    /// Reference to a record in another list.
    Ref(RecordId),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the text content if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the calendar day if this is a date value.
    pub fn as_calendar_day(&self) -> Option<NaiveDate> {
        match self {
            Value::CalendarDay(d) => Some(*d),
            _ => None,
        }
    }

    /// Get the timestamp if this is a timestamp value.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Get the referenced record id if this is a reference.
    pub fn as_ref_id(&self) -> Option<RecordId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Canonical string form used as the unique-index key component.
    ///
    /// Null values are never indexed, so this is only called on non-null
    /// values.
    pub fn canonical(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::CalendarDay(d) => d.to_string(),
            Value::Timestamp(ts) => ts.to_rfc3339(),
            Value::Ref(id) => id.to_hex(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::CalendarDay(d)
    }
}

impl From<RecordId> for Value {
    fn from(id: RecordId) -> Self {
        Value::Ref(id)
    }
}

/// An ordered field-name to value map.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(BTreeMap<String, Value>);

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field assignment.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Insert a field value in place.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Remove a field, returning its previous value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Check whether a field is present (even if null).
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Iterate over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlay another document on top of this one (patch semantics).
    pub fn merge(&mut self, patch: Document) {
        for (field, value) in patch.0 {
            self.0.insert(field, value);
        }
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_builder() {
        let doc = Document::new()
            .set("name", "Alice")
            .set("date", NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());

        assert_eq!(doc.len(), 2);
        assert_eq!(doc.get("name").and_then(Value::as_text), Some("Alice"));
        assert!(doc.get("date").and_then(Value::as_calendar_day).is_some());
        assert!(!doc.contains("missing"));
    }

    #[test]
    fn test_merge_overrides() {
        let mut doc = Document::new().set("a", "1").set("b", "2");
        doc.merge(Document::new().set("b", "3").set("c", "4"));

        assert_eq!(doc.get("a").and_then(Value::as_text), Some("1"));
        assert_eq!(doc.get("b").and_then(Value::as_text), Some("3"));
        assert_eq!(doc.get("c").and_then(Value::as_text), Some("4"));
    }

    #[test]
    fn test_value_json_roundtrip() {
        let doc = Document::new()
            .set("text", "hello")
            .set("day", NaiveDate::from_ymd_opt(2023, 1, 1).unwrap())
            .set("when", Value::Timestamp(Utc::now()))
            .set("count", Value::Int(7))
            .set("gone", Value::Null);

        let bytes = serde_json::to_vec(&doc).unwrap();
        let decoded: Document = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc, decoded);
    }

    #[test]
    fn test_canonical_forms() {
        let day = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert_eq!(Value::CalendarDay(day).canonical(), "2023-01-01");
        assert_eq!(Value::Text("x".into()).canonical(), "x");
        assert_eq!(Value::Int(-3).canonical(), "-3");
        assert_eq!(Value::Bool(true).canonical(), "true");
    }
}
