//! Field kind definitions for the catalog.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Semantic field kinds supported by Turnstile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// UTF-8 text.
    Text,
    /// Secret text stored as an argon2 hash, never plaintext.
    Password,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit floating point.
    Float,
    /// Boolean value.
    Bool,
    /// UTC timestamp.
    Timestamp,
    /// Calendar date without a time component.
    CalendarDay,
    /// One of a fixed set of string options.
    Select {
        /// Allowed option values.
        options: Vec<String>,
    },
}

impl FieldKind {
    /// Check if values of this kind are stored as text.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            FieldKind::Text | FieldKind::Password | FieldKind::Select { .. }
        )
    }

    /// Check whether a value is acceptable for this kind.
    ///
    /// Null is always acceptable here; required-ness is a separate check.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (FieldKind::Text, Value::Text(_)) => true,
            (FieldKind::Password, Value::Text(_)) => true,
            (FieldKind::Integer, Value::Int(_)) => true,
            (FieldKind::Float, Value::Float(_)) => true,
            (FieldKind::Bool, Value::Bool(_)) => true,
            (FieldKind::Timestamp, Value::Timestamp(_)) => true,
            (FieldKind::CalendarDay, Value::CalendarDay(_)) => true,
            (FieldKind::Select { options }, Value::Text(s)) => options.iter().any(|o| o == s),
            _ => false,
        }
    }

    /// Human-readable name used in type-mismatch errors.
    pub fn describe(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Password => "password text",
            FieldKind::Integer => "an integer",
            FieldKind::Float => "a float",
            FieldKind::Bool => "a boolean",
            FieldKind::Timestamp => "a timestamp",
            FieldKind::CalendarDay => "a calendar day",
            FieldKind::Select { .. } => "one of the declared options",
        }
    }
}
