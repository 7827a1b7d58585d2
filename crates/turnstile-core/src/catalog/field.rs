//! Field definitions for lists.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::types::FieldKind;
use crate::value::Value;

/// A field definition within a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Semantic field kind.
    pub kind: FieldKind,
    /// Whether the field must be present and non-null.
    pub required: bool,
    /// Whether values must be unique across all records of the list.
    pub unique: bool,
    /// Default value applied when the field is unset at create time.
    pub default: Option<DefaultValue>,
    /// Explicit storage column name, when it differs from the field name.
    pub db_column: Option<String>,
}

/// Default value for a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    /// Fixed text.
    Text(String),
    /// Fixed integer.
    Integer(i64),
    /// Fixed float.
    Float(f64),
    /// Fixed boolean.
    Bool(bool),
    /// Fixed calendar date.
    CalendarDay(NaiveDate),
    /// Current timestamp, evaluated at create time.
    Now,
}

impl DefaultValue {
    /// Materialize the default into a concrete value.
    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Text(s) => Value::Text(s.clone()),
            DefaultValue::Integer(i) => Value::Int(*i),
            DefaultValue::Float(f) => Value::Float(*f),
            DefaultValue::Bool(b) => Value::Bool(*b),
            DefaultValue::CalendarDay(d) => Value::CalendarDay(*d),
            DefaultValue::Now => Value::Timestamp(Utc::now()),
        }
    }

    /// Check that this default can inhabit the given field kind.
    pub fn matches_kind(&self, kind: &FieldKind) -> bool {
        match self {
            DefaultValue::Now => matches!(kind, FieldKind::Timestamp),
            other => kind.accepts(&other.resolve()),
        }
    }
}

impl FieldDef {
    /// Create a new optional field.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            unique: false,
            default: None,
            db_column: None,
        }
    }

    /// Create a text field.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    /// Create a password field.
    pub fn password(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Password)
    }

    /// Create a timestamp field.
    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Timestamp)
    }

    /// Create a calendar-day field.
    pub fn calendar_day(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::CalendarDay)
    }

    /// Mark as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark as globally unique within the list.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Map the field to an explicit storage column name.
    pub fn with_db_column(mut self, column: impl Into<String>) -> Self {
        self.db_column = Some(column.into());
        self
    }

    /// Check if this field has a default value.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// The storage column name (the field name unless remapped).
    pub fn column(&self) -> &str {
        self.db_column.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_def_builder() {
        let field = FieldDef::text("email").required().unique();

        assert_eq!(field.name, "email");
        assert!(field.required);
        assert!(field.unique);
        assert!(!field.has_default());
        assert_eq!(field.column(), "email");
    }

    #[test]
    fn test_db_column_mapping() {
        let field = FieldDef::calendar_day("date")
            .required()
            .with_default(DefaultValue::CalendarDay(
                NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            ))
            .with_db_column("my_date");

        assert_eq!(field.column(), "my_date");
        assert!(field.has_default());
    }

    #[test]
    fn test_default_resolution() {
        let default = DefaultValue::CalendarDay(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(
            default.resolve().as_calendar_day(),
            NaiveDate::from_ymd_opt(2023, 1, 1)
        );

        assert!(DefaultValue::Now.resolve().as_timestamp().is_some());
    }

    #[test]
    fn test_default_kind_matching() {
        assert!(DefaultValue::Now.matches_kind(&FieldKind::Timestamp));
        assert!(!DefaultValue::Now.matches_kind(&FieldKind::CalendarDay));
        assert!(DefaultValue::Text("x".into()).matches_kind(&FieldKind::Text));
        assert!(!DefaultValue::Integer(1).matches_kind(&FieldKind::Text));
    }
}
