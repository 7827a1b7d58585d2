//! Semantic catalog for Turnstile.
//!
//! The catalog stores metadata about lists, fields, relations, and schema
//! versions.

mod catalog;
mod field;
mod list;
mod relation;
mod schema;
mod types;

pub use catalog::Catalog;
pub use field::{DefaultValue, FieldDef};
pub use list::{ListDef, ListUi};
pub use relation::{Cardinality, DeleteBehavior, DisplayMode, RelationDef, RelationUi};
pub use schema::SchemaBundle;
pub use types::FieldKind;
