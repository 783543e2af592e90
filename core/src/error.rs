//! Errors raised while declaring schemas or compiling queries.
//!
//! Everything in this crate is pure and IO-free, so the error taxonomy
//! here only covers construction-time mistakes: a malformed table name, a
//! filter referring to a column that doesn't exist, a property whose
//! value kind the codec doesn't know how to store. Anything that needs a
//! live connection (a SQLite error, a migration failure) is a `gom::Error`
//! one crate up.

use thiserror::Error;

/// Result type wrapping [Error].
pub type Result<T> = std::result::Result<T, Error>;

/// Schema- and query-construction errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A table name didn't match `[A-Za-z_][A-Za-z0-9_]*`.
    #[error("invalid table name: {0:?}")]
    InvalidTableName(String),

    /// A filter or sorting term named a property that doesn't resolve in
    /// the entity's schema or any ancestor schema.
    #[error("unknown column: {entity}.{property}")]
    UnknownColumn {
        entity: &'static str,
        property: &'static str,
    },

    /// A value kind has no mapping to a SQLite storage class.
    #[error("unsupported value kind: {0:?}")]
    UnsupportedKind(String),

    /// Schema registration was invalid (duplicate property, no primary
    /// key, non-monotonic version, etc).
    #[error("invalid schema for {entity}: {reason}")]
    InvalidSchema {
        entity: &'static str,
        reason: String,
    },

    /// A reference target named an entity type the registry doesn't know
    /// about (and that wasn't forward-declared).
    #[error("unknown reference target: {0:?}")]
    UnknownEntity(String),

    /// `And`/`Or` was constructed with zero children.
    #[error("{0} requires at least one child filter")]
    EmptyFilterGroup(&'static str),
}
