//! Storage engine implementation.

use sled::{Db, Tree};

use super::{Record, RecordId, StorageConfig, VersionedKey};
use crate::error::Error;

/// Tree name for record data.
const DATA_TREE: &str = "data";

/// Tree name for metadata (latest versions, etc.).
const META_TREE: &str = "meta";

/// Tree name for the list membership index.
const LIST_INDEX_TREE: &str = "index:list";

/// Prefix for latest version pointers in the meta tree.
const LATEST_PREFIX: &[u8] = b"latest:";

/// The main storage engine wrapping sled.
///
/// Records are versioned: every write adds a version keyed by
/// `(record_id, timestamp)` and updates a latest-version pointer. Deletes
/// write tombstones. A list index maps `list \0 record_id` entries so a
/// whole list can be scanned without touching other lists.
pub struct StorageEngine {
    /// The underlying sled database.
    db: Db,

    /// Tree for record data (versioned).
    data_tree: Tree,

    /// Tree for metadata.
    meta_tree: Tree,

    /// Tree for list membership (list name + record id -> empty).
    list_index_tree: Tree,
}

impl StorageEngine {
    /// Open or create a storage engine with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        let data_tree = db.open_tree(DATA_TREE)?;
        let meta_tree = db.open_tree(META_TREE)?;
        let list_index_tree = db.open_tree(LIST_INDEX_TREE)?;

        Ok(Self {
            db,
            data_tree,
            meta_tree,
            list_index_tree,
        })
    }

    /// Write a new version of a record into a list.
    pub fn put(&self, list: &str, key: VersionedKey, record: Record) -> Result<(), Error> {
        let value_bytes = record.to_bytes()?;
        self.data_tree.insert(key.encode(), value_bytes)?;
        self.update_latest(key.id, key.version_ts)?;

        let index_key = Self::list_index_key(list, key.id);
        self.list_index_tree.insert(index_key, &[])?;

        Ok(())
    }

    /// Get a specific version of a record. Tombstones read as `None`.
    pub fn get(&self, id: RecordId, version_ts: u64) -> Result<Option<Record>, Error> {
        let key = VersionedKey::new(id, version_ts);
        match self.data_tree.get(key.encode())? {
            Some(bytes) => {
                let record = Record::from_bytes(&bytes)?;
                if record.deleted {
                    Ok(None)
                } else {
                    Ok(Some(record))
                }
            }
            None => Ok(None),
        }
    }

    /// Get the latest version of a record.
    ///
    /// Returns the version timestamp and record if the record exists and is
    /// not deleted.
    pub fn get_latest(&self, id: RecordId) -> Result<Option<(u64, Record)>, Error> {
        let latest_key = Self::latest_key(id);
        let version_ts = match self.meta_tree.get(&latest_key)? {
            Some(bytes) => {
                let mut ts_bytes = [0u8; 8];
                ts_bytes.copy_from_slice(&bytes);
                u64::from_be_bytes(ts_bytes)
            }
            None => return Ok(None),
        };

        match self.get(id, version_ts)? {
            Some(record) => Ok(Some((version_ts, record))),
            None => Ok(None),
        }
    }

    /// Check whether a live (non-deleted) record exists in the given list.
    pub fn exists_in(&self, list: &str, id: RecordId) -> Result<bool, Error> {
        let index_key = Self::list_index_key(list, id);
        if self.list_index_tree.get(index_key)?.is_none() {
            return Ok(false);
        }
        Ok(self.get_latest(id)?.is_some())
    }

    /// Scan all versions of a record in chronological order.
    pub fn scan_versions(
        &self,
        id: RecordId,
    ) -> impl Iterator<Item = Result<(u64, Record), Error>> + '_ {
        let min_key = VersionedKey::min_for_record(id);
        let max_key = VersionedKey::max_for_record(id);

        self.data_tree
            .range(min_key.encode()..=max_key.encode())
            .map(move |result| {
                let (key_bytes, value_bytes) = result?;
                let key = VersionedKey::decode(&key_bytes).ok_or(Error::InvalidKey)?;
                if key.id != id {
                    return Err(Error::InvalidKey);
                }

                let record = Record::from_bytes(&value_bytes)?;
                Ok((key.version_ts, record))
            })
    }

    /// Soft delete a record by writing a tombstone version.
    ///
    /// The list index entry remains so version history stays reachable;
    /// scans filter tombstones out via `get_latest`.
    pub fn delete(&self, id: RecordId) -> Result<u64, Error> {
        let key = VersionedKey::now(id);
        self.data_tree.insert(key.encode(), Record::tombstone().to_bytes()?)?;
        self.update_latest(id, key.version_ts)?;
        Ok(key.version_ts)
    }

    /// Scan the latest live version of every record in a list.
    pub fn scan_list(
        &self,
        list: &str,
    ) -> impl Iterator<Item = Result<(RecordId, u64, Record), Error>> + '_ {
        let prefix = Self::list_index_prefix(list);
        let prefix_len = prefix.len();

        self.list_index_tree
            .scan_prefix(&prefix)
            .filter_map(move |result| match result {
                Ok((key, _)) => {
                    if key.len() != prefix_len + 16 {
                        return Some(Err(Error::InvalidKey));
                    }
                    let mut id_bytes = [0u8; 16];
                    id_bytes.copy_from_slice(&key[prefix_len..]);
                    let id = RecordId::from_bytes(id_bytes);

                    match self.get_latest(id) {
                        Ok(Some((version_ts, record))) => Some(Ok((id, version_ts, record))),
                        Ok(None) => None, // Tombstoned.
                        Err(e) => Some(Err(e)),
                    }
                }
                Err(e) => Some(Err(e.into())),
            })
    }

    /// All record ids ever written to a list, including deleted ones.
    pub fn list_record_ids(
        &self,
        list: &str,
    ) -> impl Iterator<Item = Result<RecordId, Error>> + '_ {
        let prefix = Self::list_index_prefix(list);
        let prefix_len = prefix.len();

        self.list_index_tree
            .scan_prefix(&prefix)
            .map(move |result| {
                let (key, _) = result?;
                if key.len() != prefix_len + 16 {
                    return Err(Error::InvalidKey);
                }
                let mut id_bytes = [0u8; 16];
                id_bytes.copy_from_slice(&key[prefix_len..]);
                Ok(RecordId::from_bytes(id_bytes))
            })
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    /// Get database size in bytes.
    pub fn size_on_disk(&self) -> Result<u64, Error> {
        Ok(self.db.size_on_disk()?)
    }

    /// Get the underlying sled database (for opening new trees).
    pub fn db(&self) -> &Db {
        &self.db
    }

    fn list_index_key(list: &str, id: RecordId) -> Vec<u8> {
        let mut key = Vec::with_capacity(list.len() + 1 + 16);
        key.extend_from_slice(list.as_bytes());
        key.push(0); // Null separator.
        key.extend_from_slice(id.as_bytes());
        key
    }

    fn list_index_prefix(list: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(list.len() + 1);
        prefix.extend_from_slice(list.as_bytes());
        prefix.push(0);
        prefix
    }

    /// Update the latest version pointer for a record.
    fn update_latest(&self, id: RecordId, version_ts: u64) -> Result<(), Error> {
        self.meta_tree
            .insert(Self::latest_key(id), &version_ts.to_be_bytes())?;
        Ok(())
    }

    fn latest_key(id: RecordId) -> Vec<u8> {
        let mut key = Vec::with_capacity(LATEST_PREFIX.len() + 16);
        key.extend_from_slice(LATEST_PREFIX);
        key.extend_from_slice(id.as_bytes());
        key
    }
}
