//! Turnstile Core - Schema catalog, constraint enforcement, and record storage.
//!
//! This crate provides the data layer behind a Turnstile backend: list
//! definitions are declared through the [`catalog`] module, applied to a
//! [`Database`], and every create/update/delete is checked against the
//! declared constraints before it reaches storage.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod access;
pub mod catalog;
pub mod constraint;
pub mod database;
pub mod error;
pub mod password;
pub mod storage;
pub mod value;

pub use access::{AccessPolicy, AccessRule, Operation};
pub use catalog::{
    Cardinality, Catalog, DefaultValue, DeleteBehavior, DisplayMode, FieldDef, FieldKind, ListDef,
    ListUi, RelationDef, RelationUi, SchemaBundle,
};
pub use constraint::{ConstraintValidator, UniqueClaims, UniqueIndex};
pub use database::Database;
pub use error::{ConstraintError, Error};
pub use storage::{Record, RecordId, StorageConfig, StorageEngine, VersionedKey};
pub use value::{Document, Value};
