//! Constraint enforcement module.
//!
//! Validates documents against the declared schema before they are written:
//! required fields, value/kind agreement, uniqueness, and relationship
//! references.

mod unique_index;
mod validator;

pub use unique_index::UniqueIndex;
pub use validator::{ConstraintValidator, UniqueClaims};
