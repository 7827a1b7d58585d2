//! Catalog manager for storing and retrieving schema metadata.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use sled::{Db, Tree};

use super::{ListDef, RelationDef, SchemaBundle};
use crate::error::Error;

/// Tree name for schema bundles.
const SCHEMA_TREE: &str = "catalog:schemas";

/// Tree name for catalog metadata.
const META_TREE: &str = "catalog:meta";

/// Key for current schema version in the meta tree.
const CURRENT_VERSION_KEY: &[u8] = b"current_version";

/// The catalog manager for schema metadata.
///
/// Bundles are validated before they are applied, and every applied version
/// is retained.
pub struct Catalog {
    /// Schema bundles tree.
    schema_tree: Tree,
    /// Metadata tree.
    meta_tree: Tree,
    /// Current schema version (cached).
    current_version: AtomicU64,
    /// Current schema (cached).
    current_schema: RwLock<Option<SchemaBundle>>,
}

impl Catalog {
    /// Open or create a catalog using the given sled database.
    pub fn open(db: &Db) -> Result<Self, Error> {
        let schema_tree = db.open_tree(SCHEMA_TREE)?;
        let meta_tree = db.open_tree(META_TREE)?;

        let current_version = match meta_tree.get(CURRENT_VERSION_KEY)? {
            Some(bytes) => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes);
                u64::from_be_bytes(buf)
            }
            None => 0,
        };

        let catalog = Self {
            schema_tree,
            meta_tree,
            current_version: AtomicU64::new(current_version),
            current_schema: RwLock::new(None),
        };

        // Pre-load the current schema if one exists.
        if current_version > 0 {
            if let Some(schema) = catalog.schema_at_version(current_version)? {
                *catalog.current_schema.write().unwrap() = Some(schema);
            }
        }

        Ok(catalog)
    }

    /// Get the current schema version.
    pub fn current_version(&self) -> u64 {
        self.current_version.load(Ordering::SeqCst)
    }

    /// Get the current schema bundle.
    pub fn current_schema(&self) -> Option<SchemaBundle> {
        self.current_schema.read().unwrap().clone()
    }

    /// Get a schema bundle at a specific version.
    pub fn schema_at_version(&self, version: u64) -> Result<Option<SchemaBundle>, Error> {
        match self.schema_tree.get(version.to_be_bytes())? {
            Some(bytes) => Ok(Some(SchemaBundle::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Validate and apply a new schema bundle.
    ///
    /// The bundle's version is assigned here. Returns the new version number.
    pub fn apply_schema(&self, mut bundle: SchemaBundle) -> Result<u64, Error> {
        bundle.validate()?;

        let new_version = self.current_version() + 1;
        bundle.version = new_version;

        self.schema_tree
            .insert(new_version.to_be_bytes(), bundle.to_bytes()?)?;
        self.meta_tree
            .insert(CURRENT_VERSION_KEY, &new_version.to_be_bytes())?;

        self.current_version.store(new_version, Ordering::SeqCst);
        *self.current_schema.write().unwrap() = Some(bundle);

        tracing::info!(version = new_version, "applied schema");
        Ok(new_version)
    }

    /// Get a list definition by name from the current schema.
    pub fn get_list(&self, name: &str) -> Option<ListDef> {
        let guard = self.current_schema.read().unwrap();
        guard.as_ref().and_then(|s| s.get_list(name).cloned())
    }

    /// List all list names in the current schema.
    pub fn list_names(&self) -> Vec<String> {
        let guard = self.current_schema.read().unwrap();
        guard
            .as_ref()
            .map(|s| s.list_names().into_iter().map(String::from).collect())
            .unwrap_or_default()
    }

    /// Get a relation definition by name from the current schema.
    pub fn get_relation(&self, name: &str) -> Option<RelationDef> {
        let guard = self.current_schema.read().unwrap();
        guard.as_ref().and_then(|s| s.get_relation(name).cloned())
    }

    /// List all applied schema versions.
    pub fn list_versions(&self) -> Result<Vec<u64>, Error> {
        let mut versions = Vec::new();
        for result in self.schema_tree.iter() {
            let (key, _) = result?;
            if key.len() == 8 {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&key);
                versions.push(u64::from_be_bytes(buf));
            }
        }
        versions.sort();
        Ok(versions)
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.schema_tree.flush()?;
        self.meta_tree.flush()?;
        Ok(())
    }
}
