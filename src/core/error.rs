//! Error types for the record store
//!
//! Every fallible operation returns a [`DatabaseError`]. Variants fall into the
//! categories reported by [`DatabaseError::kind`], so callers can tell a driver
//! failure apart from a capacity problem or a value that does not fit its field.

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Broad category of a [`DatabaseError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Host type and table shape disagree (unknown column, bad column index)
    Schema,
    /// Reported by the underlying SQL engine
    Driver,
    /// Misuse of a statement, pool, or transaction; not a data problem
    ResourceState,
    /// A dynamic value does not fit the requested host type
    Decode,
    /// JSON encoding or decoding of an aggregate value failed
    Serialization,
}

/// Error types for database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Column name is not part of the record type
    #[error("Unknown column `{column}` on table `{table}`")]
    UnknownColumn { table: String, column: String },

    /// Column index is past the end of the result row
    #[error("Column index {index} out of range for row with {count} columns")]
    ColumnOutOfRange { index: usize, count: usize },

    /// Backend failed to open a connection
    #[error("Failed to open connection: {0}")]
    Open(String),

    /// Backend rejected the SQL text
    #[error("Prepare failed for `{sql}`: {message}")]
    Prepare {
        sql: String,
        message: String,
        code: Option<i32>,
    },

    /// Backend rejected a bound value
    #[error("Bind failed at parameter {index}: {message}")]
    Bind { index: usize, message: String },

    /// Statement execution failed (constraint violation, busy database, ...)
    #[error("Execution error: {message}")]
    Execution { message: String, code: Option<i32> },

    /// Bind index past the statement's placeholder count
    #[error("Bind index {index} out of range for statement with {count} parameters")]
    BindIndexOutOfRange { index: usize, count: usize },

    /// Statement stepped before every placeholder was bound
    #[error("Parameter {index} was never bound")]
    UnboundParameter { index: usize },

    /// Statement was already finalized
    #[error("Statement has been finalized")]
    StatementFinalized,

    /// Pool has no free connection and the policy forbids waiting
    #[error("Connection pool exhausted: {in_use}/{max} connections in use")]
    PoolExhausted { in_use: usize, max: usize },

    /// Waiting for a pooled connection took too long
    #[error("Connection checkout timed out after {timeout_ms}ms")]
    PoolTimeout { timeout_ms: u64 },

    /// Pool was closed before or during checkout
    #[error("Connection pool is closed")]
    PoolClosed,

    /// Transaction misuse
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Dynamic value kind is incompatible with the host type
    #[error("Type mismatch: expected {expected}, found {found}")]
    Decode { expected: &'static str, found: String },

    /// NULL read into a non-optional field
    #[error("Unexpected NULL for non-optional {expected}")]
    UnexpectedNull { expected: &'static str },

    /// Numeric value does not fit the host type
    #[error("Value {value} out of range for {target}")]
    OutOfRange { value: String, target: &'static str },

    /// JSON encoding/decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite error not covered by a more specific variant
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl DatabaseError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DatabaseError::UnknownColumn { .. } | DatabaseError::ColumnOutOfRange { .. } => {
                ErrorKind::Schema
            }
            DatabaseError::Open(_)
            | DatabaseError::Prepare { .. }
            | DatabaseError::Bind { .. }
            | DatabaseError::Execution { .. } => ErrorKind::Driver,
            #[cfg(feature = "sqlite")]
            DatabaseError::Sqlite(_) => ErrorKind::Driver,
            DatabaseError::BindIndexOutOfRange { .. }
            | DatabaseError::UnboundParameter { .. }
            | DatabaseError::StatementFinalized
            | DatabaseError::PoolExhausted { .. }
            | DatabaseError::PoolTimeout { .. }
            | DatabaseError::PoolClosed
            | DatabaseError::Transaction(_) => ErrorKind::ResourceState,
            DatabaseError::Decode { .. }
            | DatabaseError::UnexpectedNull { .. }
            | DatabaseError::OutOfRange { .. } => ErrorKind::Decode,
            DatabaseError::Json(_) => ErrorKind::Serialization,
        }
    }

    /// Driver-provided error code, when the backend reported one
    pub fn code(&self) -> Option<i32> {
        match self {
            DatabaseError::Prepare { code, .. } | DatabaseError::Execution { code, .. } => *code,
            _ => None,
        }
    }

    /// Create an unknown column error
    pub fn unknown_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        DatabaseError::UnknownColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Create an open error
    pub fn open<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Open(msg.into())
    }

    /// Create a prepare error carrying the driver message
    pub fn prepare(sql: impl Into<String>, message: impl Into<String>, code: Option<i32>) -> Self {
        DatabaseError::Prepare {
            sql: sql.into(),
            message: message.into(),
            code,
        }
    }

    /// Create a bind error carrying the driver message
    pub fn bind(index: usize, message: impl Into<String>) -> Self {
        DatabaseError::Bind {
            index,
            message: message.into(),
        }
    }

    /// Create an execution error carrying the driver message
    pub fn execution(message: impl Into<String>, code: Option<i32>) -> Self {
        DatabaseError::Execution {
            message: message.into(),
            code,
        }
    }

    /// Create a pool exhausted error
    pub fn pool_exhausted(in_use: usize, max: usize) -> Self {
        DatabaseError::PoolExhausted { in_use, max }
    }

    /// Create a pool timeout error
    pub fn pool_timeout(timeout_ms: u64) -> Self {
        DatabaseError::PoolTimeout { timeout_ms }
    }

    /// Create a new transaction error
    pub fn transaction<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Transaction(msg.into())
    }

    /// Create a decode error
    pub fn decode(expected: &'static str, found: impl Into<String>) -> Self {
        DatabaseError::Decode {
            expected,
            found: found.into(),
        }
    }

    /// Create an out-of-range error
    pub fn out_of_range(value: impl ToString, target: &'static str) -> Self {
        DatabaseError::OutOfRange {
            value: value.to_string(),
            target,
        }
    }
}
