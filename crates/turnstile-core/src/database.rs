//! The database facade.
//!
//! [`Database`] wires the storage engine, the catalog, and the unique index
//! together and exposes the record operations applications use: create, get,
//! list, update, delete, relation traversal, and password verification.
//! Every operation is gated by the list's access policy and checked against
//! the declared constraints before storage is touched.

use std::collections::HashSet;

use crate::access::Operation;
use crate::catalog::{Catalog, DeleteBehavior, FieldKind, ListDef, SchemaBundle};
use crate::constraint::{ConstraintValidator, UniqueIndex};
use crate::error::Error;
use crate::password;
use crate::storage::{Record, RecordId, StorageConfig, StorageEngine, VersionedKey};
use crate::value::{Document, Value};

/// A schema-driven record store.
pub struct Database {
    engine: StorageEngine,
    catalog: Catalog,
    unique: UniqueIndex,
}

impl Database {
    /// Open or create a database with the given storage configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let engine = StorageEngine::open(config)?;
        let catalog = Catalog::open(engine.db())?;
        let unique = UniqueIndex::open(engine.db())?;

        tracing::info!(
            schema_version = catalog.current_version(),
            "database opened"
        );

        Ok(Self {
            engine,
            catalog,
            unique,
        })
    }

    /// Validate and apply a schema bundle. Returns the new schema version.
    pub fn apply_schema(&self, bundle: SchemaBundle) -> Result<u64, Error> {
        self.catalog.apply_schema(bundle)
    }

    /// The catalog managing applied schemas.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The underlying storage engine.
    pub fn engine(&self) -> &StorageEngine {
        &self.engine
    }

    /// Create a record in a list.
    ///
    /// Defaults are applied to unset fields, password fields are hashed, and
    /// all declared constraints are checked before the record is written.
    pub fn create(&self, list: &str, mut doc: Document) -> Result<RecordId, Error> {
        let schema = self.current_schema()?;
        let def = Self::list_def(&schema, list)?;
        Self::check_access(def, Operation::Create)?;

        Self::apply_defaults(def, &mut doc);
        self.hash_password_fields(def, &mut doc)?;
        let record = Record::from_document(&doc)?;

        let id = RecordId::generate();
        let validator = ConstraintValidator::new(&schema, &self.engine, &self.unique);
        let claims = validator.validate_create(def, id, &doc)?;

        if let Err(err) = self.engine.put(list, VersionedKey::now(id), record) {
            claims.rollback(&self.unique, list, id);
            return Err(err);
        }
        claims.commit(&self.unique, list, id)?;

        tracing::debug!(list, id = %id, "created record");
        Ok(id)
    }

    /// Get a record by id.
    pub fn get(&self, list: &str, id: RecordId) -> Result<Document, Error> {
        let schema = self.current_schema()?;
        let def = Self::list_def(&schema, list)?;
        Self::check_access(def, Operation::Query)?;

        self.fetch(list, id)
    }

    /// Get all live records of a list.
    pub fn list(&self, list: &str) -> Result<Vec<(RecordId, Document)>, Error> {
        let schema = self.current_schema()?;
        let def = Self::list_def(&schema, list)?;
        Self::check_access(def, Operation::Query)?;

        let mut records = Vec::new();
        for result in self.engine.scan_list(list) {
            let (id, _, record) = result?;
            records.push((id, record.document()?));
        }
        Ok(records)
    }

    /// Apply a patch to a record. Returns the updated document.
    ///
    /// Fields absent from the patch keep their stored values. Changed unique
    /// values are re-checked and migrated in the index.
    pub fn update(&self, list: &str, id: RecordId, mut patch: Document) -> Result<Document, Error> {
        let schema = self.current_schema()?;
        let def = Self::list_def(&schema, list)?;
        Self::check_access(def, Operation::Update)?;

        let old = self.fetch(list, id)?;
        self.hash_password_fields(def, &mut patch)?;

        let validator = ConstraintValidator::new(&schema, &self.engine, &self.unique);
        let claims = validator.validate_update(def, id, &old, &patch)?;

        let mut merged = old;
        merged.merge(patch);
        let record = match Record::from_document(&merged) {
            Ok(record) => record,
            Err(err) => {
                claims.rollback(&self.unique, list, id);
                return Err(err);
            }
        };
        if let Err(err) = self.engine.put(list, VersionedKey::now(id), record) {
            claims.rollback(&self.unique, list, id);
            return Err(err);
        }
        // Old values free up only once the new document is stored.
        claims.commit(&self.unique, list, id)?;

        tracing::debug!(list, id = %id, "updated record");
        Ok(merged)
    }

    /// Delete a record.
    ///
    /// Relations referencing the record are honored first: `Restrict` blocks
    /// the deletion, `SetNull` clears the references, `Cascade` deletes the
    /// referencing records too.
    pub fn delete(&self, list: &str, id: RecordId) -> Result<(), Error> {
        let schema = self.current_schema()?;
        let def = Self::list_def(&schema, list)?;
        Self::check_access(def, Operation::Delete)?;

        self.delete_record(&schema, def, id, &mut HashSet::new())
    }

    /// Traverse a derived to-many field.
    ///
    /// Returns all records holding a reference to `id` through the relation
    /// whose inverse field on this list is `inverse_field`.
    pub fn related(
        &self,
        list: &str,
        id: RecordId,
        inverse_field: &str,
    ) -> Result<Vec<(RecordId, Document)>, Error> {
        let schema = self.current_schema()?;
        let def = Self::list_def(&schema, list)?;
        Self::check_access(def, Operation::Query)?;

        let relation = schema
            .relation_for_inverse(list, inverse_field)
            .ok_or_else(|| Error::UnknownField {
                list: list.to_string(),
                field: inverse_field.to_string(),
            })?;

        // Traversal reads the holding list, so its policy applies too.
        let holder_def = Self::list_def(&schema, &relation.list)?;
        Self::check_access(holder_def, Operation::Query)?;

        if !self.engine.exists_in(list, id)? {
            return Err(Error::NotFound {
                list: list.to_string(),
                id: id.to_hex(),
            });
        }

        let validator = ConstraintValidator::new(&schema, &self.engine, &self.unique);
        validator.referencing_records(relation, id)
    }

    /// Verify a password candidate against the hash stored in a password
    /// field. Returns false when the field is unset.
    pub fn verify_password(
        &self,
        list: &str,
        id: RecordId,
        field: &str,
        candidate: &str,
    ) -> Result<bool, Error> {
        let schema = self.current_schema()?;
        let def = Self::list_def(&schema, list)?;
        Self::check_access(def, Operation::Query)?;

        let field_def = def.get_field(field).ok_or_else(|| Error::UnknownField {
            list: list.to_string(),
            field: field.to_string(),
        })?;
        if field_def.kind != FieldKind::Password {
            return Err(Error::Password(format!(
                "field '{field}' on list '{list}' is not a password field"
            )));
        }

        let doc = self.fetch(list, id)?;
        match doc.get(field).and_then(Value::as_text) {
            Some(hash) => password::verify_password(candidate, hash),
            None => Ok(false),
        }
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.unique.flush()?;
        self.catalog.flush()?;
        self.engine.flush()
    }

    fn current_schema(&self) -> Result<SchemaBundle, Error> {
        self.catalog.current_schema().ok_or(Error::NoSchema)
    }

    fn list_def<'a>(schema: &'a SchemaBundle, list: &str) -> Result<&'a ListDef, Error> {
        schema
            .get_list(list)
            .ok_or_else(|| Error::UnknownList(list.to_string()))
    }

    fn check_access(def: &ListDef, operation: Operation) -> Result<(), Error> {
        if def.access.permits(operation) {
            Ok(())
        } else {
            Err(Error::AccessDenied {
                list: def.name.clone(),
                operation,
            })
        }
    }

    /// Load the latest live document of a record, scoped to a list.
    fn fetch(&self, list: &str, id: RecordId) -> Result<Document, Error> {
        let not_found = || Error::NotFound {
            list: list.to_string(),
            id: id.to_hex(),
        };

        if !self.engine.exists_in(list, id)? {
            return Err(not_found());
        }
        let (_, record) = self.engine.get_latest(id)?.ok_or_else(not_found)?;
        record.document()
    }

    /// Fill unset fields that declare defaults. An explicit null counts as
    /// unset, matching create semantics where null means "not provided".
    fn apply_defaults(def: &ListDef, doc: &mut Document) {
        for field in &def.fields {
            let Some(default) = &field.default else {
                continue;
            };
            let unset = doc.get(&field.name).map_or(true, Value::is_null);
            if unset {
                doc.insert(field.name.clone(), default.resolve());
            }
        }
    }

    /// Replace plaintext in password fields with argon2 hashes.
    ///
    /// Empty strings are left alone so the required check can reject them;
    /// values that already are PHC hashes are not re-hashed.
    fn hash_password_fields(&self, def: &ListDef, doc: &mut Document) -> Result<(), Error> {
        for field in &def.fields {
            if field.kind != FieldKind::Password {
                continue;
            }
            let Some(plaintext) = doc.get(&field.name).and_then(Value::as_text) else {
                continue;
            };
            if plaintext.is_empty() || password::is_hashed(plaintext) {
                continue;
            }
            let hash = password::hash_password(plaintext)?;
            doc.insert(field.name.clone(), Value::Text(hash));
        }
        Ok(())
    }

    /// Delete a record without an access check, for cascade recursion.
    ///
    /// `deleting` tracks the records already part of this cascade walk;
    /// reference cycles re-enter records whose tombstone is not yet written,
    /// and those re-entries must be no-ops.
    fn delete_record(
        &self,
        schema: &SchemaBundle,
        def: &ListDef,
        id: RecordId,
        deleting: &mut HashSet<RecordId>,
    ) -> Result<(), Error> {
        if !deleting.insert(id) {
            return Ok(());
        }
        let doc = self.fetch(&def.name, id)?;

        let validator = ConstraintValidator::new(schema, &self.engine, &self.unique);
        validator.validate_delete(def, id)?;

        // Honor referencing relations before the tombstone is written.
        for relation in schema.relations_referencing(&def.name) {
            match relation.on_delete {
                // Checked by validate_delete above.
                DeleteBehavior::Restrict => {}
                DeleteBehavior::SetNull => {
                    for (holder_id, mut holder_doc) in validator.referencing_records(relation, id)? {
                        if relation.is_one_to_one() {
                            self.unique.release(
                                &relation.list,
                                &relation.field,
                                &Value::Ref(id).canonical(),
                                holder_id,
                            )?;
                        }
                        holder_doc.insert(relation.field.clone(), Value::Null);
                        self.engine.put(
                            &relation.list,
                            VersionedKey::now(holder_id),
                            Record::from_document(&holder_doc)?,
                        )?;
                    }
                }
                DeleteBehavior::Cascade => {
                    let holder_def = Self::list_def(schema, &relation.list)?;
                    for (holder_id, _) in validator.referencing_records(relation, id)? {
                        self.delete_record(schema, holder_def, holder_id, deleting)?;
                    }
                }
            }
        }

        // Free the record's unique claims.
        for field in def.unique_fields() {
            if let Some(value) = doc.get(&field.name) {
                if !value.is_null() {
                    self.unique
                        .release(&def.name, &field.name, &value.canonical(), id)?;
                }
            }
        }
        for relation in schema.relations_holding(&def.name) {
            if !relation.is_one_to_one() {
                continue;
            }
            if let Some(value) = doc.get(&relation.field) {
                if !value.is_null() {
                    self.unique
                        .release(&def.name, &relation.field, &value.canonical(), id)?;
                }
            }
        }

        self.engine.delete(id)?;
        tracing::debug!(list = %def.name, id = %id, "deleted record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessPolicy;
    use crate::catalog::{DefaultValue, FieldDef, RelationDef};
    use chrono::NaiveDate;

    struct TestDb {
        db: Database,
        _dir: tempfile::TempDir,
    }

    impl std::ops::Deref for TestDb {
        type Target = Database;
        fn deref(&self) -> &Self::Target {
            &self.db
        }
    }

    fn open_db() -> TestDb {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(StorageConfig::new(dir.path())).unwrap();
        TestDb { db, _dir: dir }
    }

    fn event_schema() -> SchemaBundle {
        let event = ListDef::new("Event")
            .with_field(FieldDef::text("name").unique())
            .with_field(
                FieldDef::calendar_day("date")
                    .required()
                    .with_default(DefaultValue::CalendarDay(
                        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
                    ))
                    .with_db_column("my_date"),
            )
            .with_access(AccessPolicy::allow_all());

        let ticket = ListDef::new("Ticket").with_access(AccessPolicy::allow_all());

        SchemaBundle::new()
            .with_list(event)
            .with_list(ticket)
            .with_relation(RelationDef::many_to_one(
                "ticket_event",
                "Ticket",
                "event",
                "Event",
                "ticket",
            ))
    }

    #[test]
    fn test_create_and_get() {
        let db = open_db();
        db.apply_schema(event_schema()).unwrap();

        let id = db
            .create("Event", Document::new().set("name", "RustConf"))
            .unwrap();

        let doc = db.get("Event", id).unwrap();
        assert_eq!(doc.get("name").and_then(Value::as_text), Some("RustConf"));
    }

    #[test]
    fn test_create_applies_default_date() {
        let db = open_db();
        db.apply_schema(event_schema()).unwrap();

        let id = db
            .create("Event", Document::new().set("name", "RustConf"))
            .unwrap();

        let doc = db.get("Event", id).unwrap();
        assert_eq!(
            doc.get("date").and_then(Value::as_calendar_day),
            NaiveDate::from_ymd_opt(2023, 1, 1)
        );
    }

    #[test]
    fn test_create_without_schema_fails() {
        let db = open_db();
        let result = db.create("Event", Document::new());
        assert!(matches!(result, Err(Error::NoSchema)));
    }

    #[test]
    fn test_unknown_list() {
        let db = open_db();
        db.apply_schema(event_schema()).unwrap();

        let result = db.create("Venue", Document::new());
        assert!(matches!(result, Err(Error::UnknownList(_))));
    }

    #[test]
    fn test_access_denied() {
        let db = open_db();
        let schema =
            SchemaBundle::new().with_list(ListDef::new("Audit").with_access(AccessPolicy::read_only()));
        db.apply_schema(schema).unwrap();

        let result = db.create("Audit", Document::new());
        assert!(matches!(
            result,
            Err(Error::AccessDenied {
                operation: Operation::Create,
                ..
            })
        ));
        assert!(db.list("Audit").unwrap().is_empty());
    }

    #[test]
    fn test_unique_name_enforced() {
        let db = open_db();
        db.apply_schema(event_schema()).unwrap();

        db.create("Event", Document::new().set("name", "RustConf"))
            .unwrap();
        let result = db.create("Event", Document::new().set("name", "RustConf"));
        assert!(result.is_err());

        // Other names still work.
        db.create("Event", Document::new().set("name", "FOSDEM"))
            .unwrap();
    }

    #[test]
    fn test_failed_create_leaves_unique_values_usable() {
        let db = open_db();
        let schema = SchemaBundle::new().with_list(
            ListDef::new("Account")
                .with_field(FieldDef::text("handle").unique())
                .with_field(FieldDef::text("email").unique())
                .with_access(AccessPolicy::allow_all()),
        );
        db.apply_schema(schema).unwrap();

        db.create(
            "Account",
            Document::new()
                .set("handle", "ada")
                .set("email", "ada@example.com"),
        )
        .unwrap();

        // Fails on the email collision.
        assert!(db
            .create(
                "Account",
                Document::new()
                    .set("handle", "zed")
                    .set("email", "ada@example.com"),
            )
            .is_err());

        // "zed" was never stored, so it must still be usable.
        db.create(
            "Account",
            Document::new()
                .set("handle", "zed")
                .set("email", "zed@example.com"),
        )
        .unwrap();
    }

    #[test]
    fn test_update_merges_patch() {
        let db = open_db();
        db.apply_schema(event_schema()).unwrap();

        let id = db
            .create("Event", Document::new().set("name", "RustConf"))
            .unwrap();

        let date = NaiveDate::from_ymd_opt(2023, 6, 15).unwrap();
        let updated = db.update("Event", id, Document::new().set("date", date)).unwrap();

        // Patched field changed, the rest survived.
        assert_eq!(updated.get("date").and_then(Value::as_calendar_day), Some(date));
        assert_eq!(updated.get("name").and_then(Value::as_text), Some("RustConf"));
    }

    #[test]
    fn test_update_frees_old_unique_value() {
        let db = open_db();
        db.apply_schema(event_schema()).unwrap();

        let id = db
            .create("Event", Document::new().set("name", "RustConf"))
            .unwrap();
        db.update("Event", id, Document::new().set("name", "RustConf 2023"))
            .unwrap();

        // The original name is available again.
        db.create("Event", Document::new().set("name", "RustConf"))
            .unwrap();
    }

    #[test]
    fn test_delete_sets_references_null() {
        let db = open_db();
        db.apply_schema(event_schema()).unwrap();
        db.flush().unwrap();

        let event_id = db
            .create("Event", Document::new().set("name", "RustConf"))
            .unwrap();
        db.flush().unwrap();
        let ticket_id = db
            .create("Ticket", Document::new().set("event", event_id))
            .unwrap();
        db.flush().unwrap();

        db.delete("Event", event_id).unwrap();

        assert!(db.get("Event", event_id).is_err());
        let ticket = db.get("Ticket", ticket_id).unwrap();
        assert!(ticket.get("event").is_some_and(Value::is_null));
    }

    #[test]
    fn test_delete_cascade() {
        let db = open_db();
        let schema = SchemaBundle::new()
            .with_list(
                ListDef::new("Event")
                    .with_field(FieldDef::text("name"))
                    .with_access(AccessPolicy::allow_all()),
            )
            .with_list(ListDef::new("Ticket").with_access(AccessPolicy::allow_all()))
            .with_relation(
                RelationDef::many_to_one("ticket_event", "Ticket", "event", "Event", "ticket")
                    .with_on_delete(DeleteBehavior::Cascade),
            );
        db.apply_schema(schema).unwrap();

        let event_id = db
            .create("Event", Document::new().set("name", "RustConf"))
            .unwrap();
        db.flush().unwrap();
        db.create("Ticket", Document::new().set("event", event_id))
            .unwrap();
        db.flush().unwrap();

        db.delete("Event", event_id).unwrap();
        assert!(db.list("Ticket").unwrap().is_empty());
    }

    #[test]
    fn test_cascade_handles_reference_cycles() {
        let db = open_db();
        let schema = SchemaBundle::new()
            .with_list(
                ListDef::new("Node")
                    .with_field(FieldDef::text("name"))
                    .with_access(AccessPolicy::allow_all()),
            )
            .with_relation(
                RelationDef::many_to_one("node_parent", "Node", "parent", "Node", "child")
                    .with_on_delete(DeleteBehavior::Cascade),
            );
        db.apply_schema(schema).unwrap();

        let a = db.create("Node", Document::new().set("name", "a")).unwrap();
        let b = db
            .create("Node", Document::new().set("name", "b").set("parent", a))
            .unwrap();
        // Close the cycle: a -> b -> a.
        db.update("Node", a, Document::new().set("parent", b)).unwrap();

        db.delete("Node", a).unwrap();
        assert!(db.list("Node").unwrap().is_empty());
    }

    #[test]
    fn test_related_traversal() {
        let db = open_db();
        db.apply_schema(event_schema()).unwrap();

        let event_id = db
            .create("Event", Document::new().set("name", "RustConf"))
            .unwrap();
        let other_id = db
            .create("Event", Document::new().set("name", "FOSDEM"))
            .unwrap();
        db.flush().unwrap();

        let t1 = db
            .create("Ticket", Document::new().set("event", event_id))
            .unwrap();
        let t2 = db
            .create("Ticket", Document::new().set("event", event_id))
            .unwrap();
        db.create("Ticket", Document::new().set("event", other_id))
            .unwrap();
        db.flush().unwrap();

        let tickets = db.related("Event", event_id, "ticket").unwrap();
        let ids: Vec<_> = tickets.iter().map(|(id, _)| *id).collect();

        assert_eq!(tickets.len(), 2);
        assert!(ids.contains(&t1));
        assert!(ids.contains(&t2));
    }

    #[test]
    fn test_password_hashed_and_verified() {
        let db = open_db();
        let schema = SchemaBundle::new().with_list(
            ListDef::new("Admin")
                .with_field(FieldDef::text("email").required().unique())
                .with_field(FieldDef::password("password").required())
                .with_access(AccessPolicy::allow_all()),
        );
        db.apply_schema(schema).unwrap();

        let id = db
            .create(
                "Admin",
                Document::new()
                    .set("email", "admin@example.com")
                    .set("password", "hunter2hunter2"),
            )
            .unwrap();

        // Plaintext never reaches storage.
        let doc = db.get("Admin", id).unwrap();
        let stored = doc.get("password").and_then(Value::as_text).unwrap();
        assert_ne!(stored, "hunter2hunter2");
        assert!(stored.starts_with("$argon2"));

        assert!(db
            .verify_password("Admin", id, "password", "hunter2hunter2")
            .unwrap());
        assert!(!db
            .verify_password("Admin", id, "password", "wrong")
            .unwrap());
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::new(dir.path());

        let id = {
            let db = Database::open(config.clone()).unwrap();
            db.apply_schema(event_schema()).unwrap();
            let id = db
                .create("Event", Document::new().set("name", "RustConf"))
                .unwrap();
            db.flush().unwrap();
            id
        };

        let db = Database::open(config).unwrap();
        let doc = db.get("Event", id).unwrap();
        assert_eq!(doc.get("name").and_then(Value::as_text), Some("RustConf"));

        // Uniqueness survives the restart too.
        assert!(db
            .create("Event", Document::new().set("name", "RustConf"))
            .is_err());
    }
}
