//! Storage layer for Turnstile.
//!
//! A sled-based engine with versioned records: every write creates a new
//! version, deletes write tombstones, and a type index keeps per-list scans
//! cheap.

mod config;
mod engine;
mod record;

pub mod key;

pub use config::StorageConfig;
pub use engine::StorageEngine;
pub use key::{RecordId, VersionedKey};
pub use record::Record;
