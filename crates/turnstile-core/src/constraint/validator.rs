//! Constraint validation logic.
//!
//! The ConstraintValidator checks a document against the declared schema
//! during create, update, and delete operations: unknown fields, required
//! fields, value/kind agreement, relationship references, and uniqueness.

use crate::catalog::{DeleteBehavior, FieldKind, ListDef, RelationDef, SchemaBundle};
use crate::error::{ConstraintError, Error};
use crate::storage::{RecordId, StorageEngine};
use crate::value::{Document, Value};

use super::unique_index::UniqueIndex;

/// Constraint validator for a single schema version.
pub struct ConstraintValidator<'a> {
    schema: &'a SchemaBundle,
    engine: &'a StorageEngine,
    unique: &'a UniqueIndex,
}

/// Outcome of a validation pass over the unique index.
///
/// New values are claimed during validation; stale values are only released
/// by [`commit`](Self::commit) once the record write succeeded, and a failed
/// write takes the claims back out with [`rollback`](Self::rollback). Either
/// way the index never holds a value for a document that was not stored.
#[derive(Debug, Default)]
#[must_use = "claims must be committed after the write or rolled back on failure"]
pub struct UniqueClaims {
    /// Entries inserted for the new document (field, canonical value).
    claimed: Vec<(String, String)>,
    /// Entries the old document held that the new one no longer does.
    stale: Vec<(String, String)>,
}

impl UniqueClaims {
    /// Release the stale entries after a successful write.
    pub fn commit(self, unique: &UniqueIndex, list: &str, id: RecordId) -> Result<(), Error> {
        for (field, value) in &self.stale {
            unique.release(list, field, value, id)?;
        }
        Ok(())
    }

    /// Free the new claims after a failed write, keeping the index in step
    /// with storage. Best effort: the write error is what the caller reports.
    pub fn rollback(self, unique: &UniqueIndex, list: &str, id: RecordId) {
        for (field, value) in &self.claimed {
            let _ = unique.release(list, field, value, id);
        }
    }
}

impl<'a> ConstraintValidator<'a> {
    /// Create a new constraint validator.
    pub fn new(schema: &'a SchemaBundle, engine: &'a StorageEngine, unique: &'a UniqueIndex) -> Self {
        Self {
            schema,
            engine,
            unique,
        }
    }

    /// Validate a fully-materialized document for a create operation.
    ///
    /// Defaults and password hashing have already been applied by the
    /// caller. Unique values are claimed on success, so the subsequent write
    /// cannot violate uniqueness; the caller settles the returned claims.
    pub fn validate_create(
        &self,
        list: &ListDef,
        id: RecordId,
        doc: &Document,
    ) -> Result<UniqueClaims, Error> {
        self.check_known_fields(list, doc)?;

        for field in &list.fields {
            let value = doc.get(&field.name).unwrap_or(&Value::Null);
            self.check_value(list, &field.name, &field.kind, field.required, value)?;
        }

        for relation in self.schema.relations_holding(&list.name) {
            let value = doc.get(&relation.field).unwrap_or(&Value::Null);
            self.check_reference(list, relation, value)?;
        }

        self.claim_uniques(list, id, None, doc)
    }

    /// Validate a patch against the stored document for an update.
    ///
    /// Only fields present in the patch are checked. New unique values are
    /// claimed (with this record excluded); the displaced old values are in
    /// the returned claims, released when the caller commits.
    pub fn validate_update(
        &self,
        list: &ListDef,
        id: RecordId,
        old: &Document,
        patch: &Document,
    ) -> Result<UniqueClaims, Error> {
        self.check_known_fields(list, patch)?;

        for field in &list.fields {
            if let Some(value) = patch.get(&field.name) {
                self.check_value(list, &field.name, &field.kind, field.required, value)?;
            }
        }

        for relation in self.schema.relations_holding(&list.name) {
            if let Some(value) = patch.get(&relation.field) {
                self.check_reference(list, relation, value)?;
            }
        }

        self.claim_uniques(list, id, Some(old), patch)
    }

    /// Validate that a delete is allowed.
    ///
    /// `Restrict` relations block deletion while referencing records exist;
    /// `Cascade` and `SetNull` propagation is handled by the database facade.
    pub fn validate_delete(&self, list: &ListDef, id: RecordId) -> Result<(), Error> {
        for relation in self.schema.relations_referencing(&list.name) {
            if relation.on_delete != DeleteBehavior::Restrict {
                continue;
            }

            let count = self.count_referencing(relation, id)?;
            if count > 0 {
                return Err(Error::Constraint(ConstraintError::Restrict {
                    list: list.name.clone(),
                    referencing_list: relation.list.clone(),
                    count,
                }));
            }
        }

        Ok(())
    }

    /// Find all records holding a reference to `target` via `relation`.
    pub fn referencing_records(
        &self,
        relation: &RelationDef,
        target: RecordId,
    ) -> Result<Vec<(RecordId, Document)>, Error> {
        let mut holders = Vec::new();
        for result in self.engine.scan_list(&relation.list) {
            let (id, _, record) = result?;
            let doc = record.document()?;
            if doc.get(&relation.field).and_then(Value::as_ref_id) == Some(target) {
                holders.push((id, doc));
            }
        }
        Ok(holders)
    }

    fn count_referencing(&self, relation: &RelationDef, target: RecordId) -> Result<usize, Error> {
        Ok(self.referencing_records(relation, target)?.len())
    }

    /// Reject fields the schema does not declare on this list.
    fn check_known_fields(&self, list: &ListDef, doc: &Document) -> Result<(), Error> {
        for (name, _) in doc.iter() {
            let known = list.get_field(name).is_some()
                || self.schema.relation_for_field(&list.name, name).is_some();
            if !known {
                return Err(Error::UnknownField {
                    list: list.name.clone(),
                    field: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Required and kind checks for a single scalar value.
    ///
    /// Required textual fields must also be non-empty.
    fn check_value(
        &self,
        list: &ListDef,
        field: &str,
        kind: &FieldKind,
        required: bool,
        value: &Value,
    ) -> Result<(), Error> {
        let empty_text = kind.is_textual() && value.as_text().is_some_and(str::is_empty);
        if required && (value.is_null() || empty_text) {
            return Err(Error::Constraint(ConstraintError::Required {
                list: list.name.clone(),
                field: field.to_string(),
            }));
        }

        if !kind.accepts(value) {
            return Err(Error::Constraint(ConstraintError::TypeMismatch {
                list: list.name.clone(),
                field: field.to_string(),
                expected: kind.describe().to_string(),
            }));
        }

        Ok(())
    }

    /// A relationship value must be null or a reference to a live record of
    /// the referenced list.
    fn check_reference(
        &self,
        list: &ListDef,
        relation: &RelationDef,
        value: &Value,
    ) -> Result<(), Error> {
        let target = match value {
            Value::Null => return Ok(()),
            Value::Ref(id) => *id,
            _ => {
                return Err(Error::Constraint(ConstraintError::TypeMismatch {
                    list: list.name.clone(),
                    field: relation.field.clone(),
                    expected: format!("a reference into '{}'", relation.references),
                }))
            }
        };

        if !self.engine.exists_in(&relation.references, target)? {
            return Err(Error::Constraint(ConstraintError::UnknownReference {
                list: list.name.clone(),
                field: relation.field.clone(),
                target: relation.references.clone(),
            }));
        }

        Ok(())
    }

    /// Claim unique values for this record.
    ///
    /// Unique scalar fields and one-to-one relation fields share the same
    /// index. On create `old` is None and every non-null value is claimed;
    /// on update only changed values are migrated. Every value is checked
    /// before any claim is inserted, so a conflict on one field cannot leave
    /// claims for the others behind.
    fn claim_uniques(
        &self,
        list: &ListDef,
        id: RecordId,
        old: Option<&Document>,
        doc: &Document,
    ) -> Result<UniqueClaims, Error> {
        let mut unique_fields: Vec<&str> = list.unique_fields().map(|f| f.name.as_str()).collect();
        for relation in self.schema.relations_holding(&list.name) {
            if relation.is_one_to_one() {
                unique_fields.push(relation.field.as_str());
            }
        }

        let mut claims = UniqueClaims::default();
        for field in unique_fields {
            let Some(new_value) = doc.get(field) else {
                continue;
            };
            let old_value = old.and_then(|o| o.get(field)).unwrap_or(&Value::Null);
            if new_value == old_value {
                continue;
            }

            if !new_value.is_null() {
                claims
                    .claimed
                    .push((field.to_string(), new_value.canonical()));
            }
            if !old_value.is_null() {
                claims.stale.push((field.to_string(), old_value.canonical()));
            }
        }

        for (field, value) in &claims.claimed {
            if !self.unique.is_available(&list.name, field, value, Some(id))? {
                return Err(Error::Constraint(ConstraintError::Unique {
                    list: list.name.clone(),
                    field: field.clone(),
                    value: value.clone(),
                }));
            }
        }
        for (field, value) in &claims.claimed {
            self.unique.claim(&list.name, field, value, id)?;
        }

        Ok(claims)
    }
}
