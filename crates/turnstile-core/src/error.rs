//! Core error types.

use thiserror::Error;

use crate::access::Operation;

/// Core database errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Key decoding error.
    #[error("invalid key format")]
    InvalidKey,

    /// Record not found in the given list.
    #[error("record {id} not found in list '{list}'")]
    NotFound {
        /// List name.
        list: String,
        /// Record id as hex.
        id: String,
    },

    /// No list with this name in the current schema.
    #[error("unknown list '{0}'")]
    UnknownList(String),

    /// Document carries a field the list does not declare.
    #[error("unknown field '{field}' on list '{list}'")]
    UnknownField {
        /// List name.
        list: String,
        /// Offending field name.
        field: String,
    },

    /// Schema bundle failed validation.
    #[error("invalid schema: {0}")]
    Schema(String),

    /// No schema has been applied yet.
    #[error("no schema applied")]
    NoSchema,

    /// The list's access policy denies this operation.
    #[error("access denied: {operation} on list '{list}'")]
    AccessDenied {
        /// List name.
        list: String,
        /// Denied operation.
        operation: Operation,
    },

    /// A declared constraint was violated.
    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    /// Password hashing or verification failed.
    #[error("password error: {0}")]
    Password(String),
}

/// Schema-constraint violations surfaced to callers.
#[derive(Debug, Error)]
pub enum ConstraintError {
    /// A required field is missing or null.
    #[error("field '{field}' on list '{list}' is required")]
    Required {
        /// List name.
        list: String,
        /// Field name.
        field: String,
    },

    /// A unique field already holds this value on another record.
    #[error("value '{value}' for unique field '{field}' on list '{list}' is already taken")]
    Unique {
        /// List name.
        list: String,
        /// Field name.
        field: String,
        /// Canonical form of the duplicate value.
        value: String,
    },

    /// A value does not match the declared field kind.
    #[error("field '{field}' on list '{list}' expects {expected}")]
    TypeMismatch {
        /// List name.
        list: String,
        /// Field name.
        field: String,
        /// Human-readable expected kind.
        expected: String,
    },

    /// A relationship field references a record that does not exist.
    #[error("field '{field}' on list '{list}' references a missing record in '{target}'")]
    UnknownReference {
        /// List holding the reference.
        list: String,
        /// Relationship field name.
        field: String,
        /// Referenced list name.
        target: String,
    },

    /// Deletion blocked by a Restrict relation.
    #[error(
        "cannot delete from '{list}': {count} record(s) in '{referencing_list}' still reference it"
    )]
    Restrict {
        /// List the deletion targets.
        list: String,
        /// List holding the blocking references.
        referencing_list: String,
        /// Number of referencing records.
        count: usize,
    },
}
