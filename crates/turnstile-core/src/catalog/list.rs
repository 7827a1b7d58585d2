//! List definitions.

use serde::{Deserialize, Serialize};

use super::field::FieldDef;
use crate::access::AccessPolicy;

/// A list definition (a named collection of records of one shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListDef {
    /// List name (unique within a schema).
    pub name: String,
    /// Field definitions in declaration order.
    pub fields: Vec<FieldDef>,
    /// Access rules for this list.
    pub access: AccessPolicy,
    /// Admin-UI hints.
    pub ui: ListUi,
}

/// Admin-UI hints for a list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListUi {
    /// Field used as the record label in the UI. Defaults to the first
    /// text field when unset.
    pub label_field: Option<String>,
}

impl ListDef {
    /// Create a new list definition with a deny-all policy.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            access: AccessPolicy::default(),
            ui: ListUi::default(),
        }
    }

    /// Add a field to the list.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Set the access policy.
    pub fn with_access(mut self, access: AccessPolicy) -> Self {
        self.access = access;
        self
    }

    /// Set the UI label field.
    pub fn with_label_field(mut self, field: impl Into<String>) -> Self {
        self.ui.label_field = Some(field.into());
        self
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Iterate over unique fields.
    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.unique)
    }

    /// Iterate over required fields.
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Operation;

    #[test]
    fn test_list_builder() {
        let list = ListDef::new("Admin")
            .with_field(FieldDef::text("name").required())
            .with_field(FieldDef::text("email").required().unique())
            .with_field(FieldDef::password("password").required())
            .with_access(AccessPolicy::allow_all())
            .with_label_field("name");

        assert_eq!(list.name, "Admin");
        assert_eq!(list.fields.len(), 3);
        assert!(list.access.permits(Operation::Create));
        assert_eq!(list.ui.label_field.as_deref(), Some("name"));
    }

    #[test]
    fn test_get_field() {
        let list = ListDef::new("User")
            .with_field(FieldDef::text("name"))
            .with_field(FieldDef::text("telegramId").unique());

        assert!(list.get_field("name").is_some());
        assert!(list.get_field("telegramId").is_some());
        assert!(list.get_field("nonexistent").is_none());
    }

    #[test]
    fn test_field_filters() {
        let list = ListDef::new("User")
            .with_field(FieldDef::text("name").required())
            .with_field(FieldDef::text("telegramId").unique())
            .with_field(FieldDef::text("email"));

        assert_eq!(list.unique_fields().count(), 1);
        assert_eq!(list.required_fields().count(), 1);
    }

    #[test]
    fn test_default_policy_denies() {
        let list = ListDef::new("Secret");
        assert!(!list.access.permits(Operation::Query));
    }
}
