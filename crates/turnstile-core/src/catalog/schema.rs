//! Schema bundle - versioned snapshot of the entire schema.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{FieldKind, ListDef, RelationDef};
use crate::error::Error;

/// A versioned snapshot of the entire schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaBundle {
    /// Schema version (monotonically increasing, assigned on apply).
    pub version: u64,
    /// Creation timestamp (microseconds since Unix epoch).
    pub created_at: u64,
    /// List definitions keyed by name.
    pub lists: HashMap<String, ListDef>,
    /// Relation definitions keyed by name.
    pub relations: HashMap<String, RelationDef>,
}

impl SchemaBundle {
    /// Create an empty schema bundle.
    pub fn new() -> Self {
        Self {
            version: 0,
            created_at: crate::storage::key::current_timestamp(),
            lists: HashMap::new(),
            relations: HashMap::new(),
        }
    }

    /// Add a list to the schema.
    pub fn with_list(mut self, list: ListDef) -> Self {
        self.lists.insert(list.name.clone(), list);
        self
    }

    /// Add a relation pair to the schema.
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.insert(relation.name.clone(), relation);
        self
    }

    /// Get a list by name.
    pub fn get_list(&self, name: &str) -> Option<&ListDef> {
        self.lists.get(name)
    }

    /// Get a relation by name.
    pub fn get_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.get(name)
    }

    /// Relations whose reference field lives on the given list.
    pub fn relations_holding(&self, list: &str) -> Vec<&RelationDef> {
        self.relations.values().filter(|r| r.list == list).collect()
    }

    /// Relations that reference the given list.
    pub fn relations_referencing(&self, list: &str) -> Vec<&RelationDef> {
        self.relations
            .values()
            .filter(|r| r.references == list)
            .collect()
    }

    /// The relation behind a relationship field on a list, if any.
    pub fn relation_for_field(&self, list: &str, field: &str) -> Option<&RelationDef> {
        self.relations
            .values()
            .find(|r| r.list == list && r.field == field)
    }

    /// The relation behind a derived to-many field on a list, if any.
    pub fn relation_for_inverse(&self, list: &str, inverse_field: &str) -> Option<&RelationDef> {
        self.relations
            .values()
            .find(|r| r.references == list && r.inverse_field == inverse_field)
    }

    /// List all list names.
    pub fn list_names(&self) -> Vec<&str> {
        self.lists.keys().map(|s| s.as_str()).collect()
    }

    /// Check the bundle for internal consistency.
    ///
    /// Rejects dangling relation endpoints, field/relation name collisions,
    /// unique password fields, and defaults that do not fit their field kind.
    pub fn validate(&self) -> Result<(), Error> {
        for list in self.lists.values() {
            let mut names = HashSet::new();
            let mut columns = HashSet::new();
            for field in &list.fields {
                if !names.insert(field.name.as_str()) {
                    return Err(Error::Schema(format!(
                        "duplicate field '{}' on list '{}'",
                        field.name, list.name
                    )));
                }
                if !columns.insert(field.column()) {
                    return Err(Error::Schema(format!(
                        "duplicate column '{}' on list '{}'",
                        field.column(),
                        list.name
                    )));
                }
                if field.unique && field.kind == FieldKind::Password {
                    return Err(Error::Schema(format!(
                        "password field '{}' on list '{}' cannot be unique",
                        field.name, list.name
                    )));
                }
                if let Some(default) = &field.default {
                    if !default.matches_kind(&field.kind) {
                        return Err(Error::Schema(format!(
                            "default for field '{}' on list '{}' does not match its kind",
                            field.name, list.name
                        )));
                    }
                }
            }
        }

        let mut holder_fields = HashSet::new();
        let mut inverse_fields = HashSet::new();
        for relation in self.relations.values() {
            let holder = self.lists.get(&relation.list).ok_or_else(|| {
                Error::Schema(format!(
                    "relation '{}' declared on unknown list '{}'",
                    relation.name, relation.list
                ))
            })?;
            let target = self.lists.get(&relation.references).ok_or_else(|| {
                Error::Schema(format!(
                    "relation '{}' references unknown list '{}'",
                    relation.name, relation.references
                ))
            })?;

            if holder.get_field(&relation.field).is_some() {
                return Err(Error::Schema(format!(
                    "relation field '{}' collides with a scalar field on list '{}'",
                    relation.field, relation.list
                )));
            }
            if target.get_field(&relation.inverse_field).is_some() {
                return Err(Error::Schema(format!(
                    "inverse field '{}' collides with a scalar field on list '{}'",
                    relation.inverse_field, relation.references
                )));
            }
            if !holder_fields.insert((relation.list.as_str(), relation.field.as_str())) {
                return Err(Error::Schema(format!(
                    "two relations share the field '{}' on list '{}'",
                    relation.field, relation.list
                )));
            }
            if !inverse_fields.insert((relation.references.as_str(), relation.inverse_field.as_str()))
            {
                return Err(Error::Schema(format!(
                    "two relations share the inverse field '{}' on list '{}'",
                    relation.inverse_field, relation.references
                )));
            }
        }

        Ok(())
    }

    /// Serialize the schema bundle to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a schema bundle from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

impl Default for SchemaBundle {
    fn default() -> Self {
        Self::new()
    }
}
