//! Secondary index for enforcing unique fields.
//!
//! The UniqueIndex maintains a separate sled tree that maps unique field
//! values to record ids, enabling efficient duplicate detection.

use sled::Tree;

use crate::error::{ConstraintError, Error};
use crate::storage::RecordId;

/// Tree name for the unique field index.
pub const UNIQUE_INDEX_TREE: &str = "index:unique";

/// Secondary index for enforcing unique fields.
///
/// Key format: `list \0 field \0 canonical-value` -> `record_id`
///
/// Null and absent values are never indexed; any number of records may
/// leave a unique field unset.
pub struct UniqueIndex {
    tree: Tree,
}

impl UniqueIndex {
    /// Open or create the unique index from a sled database.
    pub fn open(db: &sled::Db) -> Result<Self, Error> {
        let tree = db.open_tree(UNIQUE_INDEX_TREE)?;
        Ok(Self { tree })
    }

    fn build_key(list: &str, field: &str, value: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(list.len() + field.len() + value.len() + 2);
        key.extend_from_slice(list.as_bytes());
        key.push(0);
        key.extend_from_slice(field.as_bytes());
        key.push(0);
        key.extend_from_slice(value.as_bytes());
        key
    }

    /// Look up the record id that holds a value.
    pub fn lookup(&self, list: &str, field: &str, value: &str) -> Result<Option<RecordId>, Error> {
        let key = Self::build_key(list, field, value);
        match self.tree.get(key)? {
            Some(bytes) if bytes.len() == 16 => {
                let mut id = [0u8; 16];
                id.copy_from_slice(&bytes);
                Ok(Some(RecordId::from_bytes(id)))
            }
            _ => Ok(None),
        }
    }

    /// Check if a value is available (unclaimed, or claimed by `exclude`).
    pub fn is_available(
        &self,
        list: &str,
        field: &str,
        value: &str,
        exclude: Option<RecordId>,
    ) -> Result<bool, Error> {
        match self.lookup(list, field, value)? {
            Some(holder) => Ok(exclude == Some(holder)),
            None => Ok(true),
        }
    }

    /// Claim a value for a record.
    ///
    /// Fails with a uniqueness violation if another record already holds the
    /// value. Claiming a value the record already holds is a no-op, so
    /// updates that keep the value unchanged succeed.
    pub fn claim(
        &self,
        list: &str,
        field: &str,
        value: &str,
        id: RecordId,
    ) -> Result<(), Error> {
        if !self.is_available(list, field, value, Some(id))? {
            return Err(Error::Constraint(ConstraintError::Unique {
                list: list.to_string(),
                field: field.to_string(),
                value: value.to_string(),
            }));
        }
        self.tree
            .insert(Self::build_key(list, field, value), id.as_bytes())?;
        Ok(())
    }

    /// Release a value previously claimed by a record.
    ///
    /// Only removes the entry if it still belongs to the given record, so a
    /// release of a stale value cannot evict another record's claim.
    pub fn release(
        &self,
        list: &str,
        field: &str,
        value: &str,
        id: RecordId,
    ) -> Result<(), Error> {
        if self.lookup(list, field, value)? == Some(id) {
            self.tree.remove(Self::build_key(list, field, value))?;
        }
        Ok(())
    }

    /// Flush the index to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.tree.flush()?;
        Ok(())
    }

    /// Number of entries in the index.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_index() -> UniqueIndex {
        let db = sled::Config::new().temporary(true).open().unwrap();
        UniqueIndex::open(&db).unwrap()
    }

    #[test]
    fn test_claim_and_lookup() {
        let index = test_index();
        let id = RecordId::generate();

        index.claim("Admin", "email", "test@example.com", id).unwrap();

        let holder = index.lookup("Admin", "email", "test@example.com").unwrap();
        assert_eq!(holder, Some(id));
    }

    #[test]
    fn test_lookup_not_found() {
        let index = test_index();
        let holder = index.lookup("Admin", "email", "nobody@example.com").unwrap();
        assert_eq!(holder, None);
    }

    #[test]
    fn test_duplicate_claim_fails() {
        let index = test_index();
        let first = RecordId::generate();
        let second = RecordId::generate();

        index
            .claim("Admin", "email", "duplicate@example.com", first)
            .unwrap();

        let result = index.claim("Admin", "email", "duplicate@example.com", second);
        match result {
            Err(Error::Constraint(ConstraintError::Unique { list, field, value })) => {
                assert_eq!(list, "Admin");
                assert_eq!(field, "email");
                assert_eq!(value, "duplicate@example.com");
            }
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[test]
    fn test_reclaim_by_same_record() {
        let index = test_index();
        let id = RecordId::generate();

        index.claim("Admin", "email", "test@example.com", id).unwrap();
        // Rewriting the same value for the same record is allowed.
        index.claim("Admin", "email", "test@example.com", id).unwrap();
    }

    #[test]
    fn test_release() {
        let index = test_index();
        let id = RecordId::generate();

        index.claim("User", "telegramId", "12345", id).unwrap();
        index.release("User", "telegramId", "12345", id).unwrap();

        assert_eq!(index.lookup("User", "telegramId", "12345").unwrap(), None);

        // The value is free for someone else now.
        let other = RecordId::generate();
        index.claim("User", "telegramId", "12345", other).unwrap();
    }

    #[test]
    fn test_release_does_not_evict_other_claim() {
        let index = test_index();
        let holder = RecordId::generate();
        let stranger = RecordId::generate();

        index.claim("User", "telegramId", "12345", holder).unwrap();
        index.release("User", "telegramId", "12345", stranger).unwrap();

        assert_eq!(
            index.lookup("User", "telegramId", "12345").unwrap(),
            Some(holder)
        );
    }

    #[test]
    fn test_is_available() {
        let index = test_index();
        let holder = RecordId::generate();

        assert!(index.is_available("Event", "name", "RustConf", None).unwrap());

        index.claim("Event", "name", "RustConf", holder).unwrap();

        assert!(!index.is_available("Event", "name", "RustConf", None).unwrap());
        assert!(!index
            .is_available("Event", "name", "RustConf", Some(RecordId::generate()))
            .unwrap());
        assert!(index
            .is_available("Event", "name", "RustConf", Some(holder))
            .unwrap());
    }

    #[test]
    fn test_same_value_different_fields() {
        let index = test_index();
        let a = RecordId::generate();
        let b = RecordId::generate();

        // The same string may appear under different list/field pairs.
        index.claim("Admin", "email", "x@example.com", a).unwrap();
        index.claim("User", "telegramId", "x@example.com", b).unwrap();
    }
}
