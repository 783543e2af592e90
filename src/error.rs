//! The full error taxonomy (spec.md §7): adapter lifecycle errors, SQLite
//! engine errors, migration failures, and schema/query construction
//! errors re-exported from [gom_core].

use thiserror::Error;

/// Result type wrapping [Error].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// An operation that requires an open connection was attempted on an
    /// adapter that was never opened (or whose connection was cleared by
    /// [crate::adapter::Adapter::close]).
    #[error("adapter is not open")]
    AdapterNotOpen,

    /// [crate::adapter::Adapter::open] was called on an adapter that
    /// already holds a connection.
    #[error("adapter is already open")]
    AdapterAlreadyOpen,

    /// The SQLite engine refused to open the database file/URI.
    #[error("failed to open adapter: {0}")]
    AdapterOpenFailed(String),

    /// The adapter's worker thread has shut down; the work item was
    /// dropped without running.
    #[error("adapter is closed")]
    AdapterClosed,

    /// An engine-reported SQL error: the SQLite extended result code (when
    /// the failure came from the engine itself, rather than e.g. a type
    /// conversion), a human-readable message, and the offending SQL text
    /// when the call site has it (spec.md §7 `SqliteError(code, message,
    /// sql)`).
    #[error("sqlite error: {message}{}", sql.as_deref().map(|s| format!(" (sql: {s})")).unwrap_or_default())]
    Sqlite {
        code: Option<i32>,
        message: String,
        sql: Option<String>,
    },

    /// A [crate::command::Command] was executed without SQL text ever
    /// having been set on it.
    #[error("command has no SQL text")]
    NoSql,

    /// `find_one` found no matching row.
    #[error("no matching row")]
    EmptyResult,

    /// One migration step failed; `step` names which one.
    #[error("migration step {step} failed: {cause}")]
    MigrationFailed {
        step: u32,
        #[source]
        cause: Box<Error>,
    },

    /// A cursor column's stored kind couldn't be converted into the
    /// destination property's declared kind.
    #[error("could not materialise row into {entity}.{property}: {cause}")]
    RowMaterialiseFailed {
        entity: &'static str,
        property: &'static str,
        #[source]
        cause: gom_core::Error,
    },

    /// Schema declaration or query-compilation error, from [gom_core].
    #[error(transparent)]
    Core(#[from] gom_core::Error),
}

impl Error {
    pub(crate) fn sqlite(err: rusqlite::Error, sql: Option<&str>) -> Error {
        let code = match &err {
            rusqlite::Error::SqliteFailure(ffi_err, _) => Some(ffi_err.extended_code),
            _ => None,
        };
        Error::Sqlite {
            code,
            message: err.to_string(),
            sql: sql.map(str::to_owned),
        }
    }
}
