//! SQLite database backend implementation
//!
//! This module provides the SQLite driver behind the [`Backend`] contract,
//! built on `rusqlite` with the bundled engine.

use crate::core::backend::{Backend, Driver, RawStatement, Step};
use crate::core::error::{DatabaseError, Result};
use crate::core::value::DatabaseValue;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use serde::Deserialize;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

fn sqlite_error_code(e: &rusqlite::Error) -> Option<i32> {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => Some(err.extended_code),
        rusqlite::Error::SqlInputError { error, .. } => Some(error.extended_code),
        _ => None,
    }
}

fn execution_error(e: rusqlite::Error) -> DatabaseError {
    DatabaseError::execution(e.to_string(), sqlite_error_code(&e))
}

fn default_path() -> String {
    ":memory:".to_string()
}

fn default_true() -> bool {
    true
}

/// Options for opening an SQLite connection
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteOptions {
    /// Database file path or `file:` URI
    #[serde(default = "default_path")]
    pub path: String,
    /// Open a private in-memory database, ignoring `path`
    #[serde(default)]
    pub in_memory: bool,
    /// Enforce foreign key constraints
    #[serde(default = "default_true")]
    pub foreign_keys: bool,
    /// `PRAGMA journal_mode` to apply after opening (e.g. `"wal"`)
    #[serde(default)]
    pub journal_mode: Option<String>,
    /// How long to retry when the database is locked
    #[serde(default)]
    pub busy_timeout_ms: Option<u64>,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            path: default_path(),
            in_memory: true,
            foreign_keys: true,
            journal_mode: None,
            busy_timeout_ms: None,
        }
    }
}

impl SqliteOptions {
    /// A private in-memory database
    pub fn memory() -> Self {
        Self::default()
    }

    /// A database file
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            in_memory: false,
            ..Default::default()
        }
    }

    /// A named in-memory database shared by every connection in the process
    pub fn shared_memory(name: &str) -> Self {
        Self::file(format!("file:{}?mode=memory&cache=shared", name))
    }

    /// Enable or disable foreign key enforcement
    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Set the journal mode
    pub fn with_journal_mode(mut self, mode: impl Into<String>) -> Self {
        self.journal_mode = Some(mode.into());
        self
    }

    /// Set the busy timeout
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }
}

/// SQLite driver
pub struct SqliteDriver {
    connection: rusqlite::Connection,
}

impl SqliteDriver {
    /// The underlying `rusqlite` connection
    pub fn raw(&self) -> &rusqlite::Connection {
        &self.connection
    }
}

impl Driver for SqliteDriver {
    type Options = SqliteOptions;

    fn open(options: &SqliteOptions) -> Result<Self> {
        let connection = if options.in_memory {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&options.path)
        }
        .map_err(|e| DatabaseError::open(e.to_string()))?;

        if options.foreign_keys {
            connection
                .execute_batch("PRAGMA foreign_keys = ON")
                .map_err(|e| DatabaseError::open(e.to_string()))?;
        }
        if let Some(mode) = &options.journal_mode {
            let applied: String = connection
                .pragma_update_and_check(None, "journal_mode", mode, |row| row.get(0))
                .map_err(|e| DatabaseError::open(e.to_string()))?;
            debug!(requested = %mode, applied = %applied, "journal mode set");
        }
        if let Some(ms) = options.busy_timeout_ms {
            connection
                .busy_timeout(Duration::from_millis(ms))
                .map_err(|e| DatabaseError::open(e.to_string()))?;
        }

        debug!(
            path = if options.in_memory { ":memory:" } else { options.path.as_str() },
            "sqlite connection opened"
        );
        Ok(Self { connection })
    }
}

impl Backend for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn prepare<'c>(&'c self, sql: &str) -> Result<Box<dyn RawStatement + 'c>> {
        let statement = self
            .connection
            .prepare(sql)
            .map_err(|e| DatabaseError::prepare(sql, e.to_string(), sqlite_error_code(&e)))?;
        Ok(Box::new(SqliteStatement::new(statement)))
    }

    fn exec_all(&self, sql: &str) -> Result<()> {
        self.connection.execute_batch(sql).map_err(execution_error)
    }

    fn last_insert_rowid(&self) -> i64 {
        self.connection.last_insert_rowid()
    }

    fn rows_affected(&self) -> u64 {
        self.connection.changes() as u64
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.connection
            .close()
            .map_err(|(_, e)| DatabaseError::from(e))
    }
}

/// Prepared SQLite statement
///
/// The first step runs the statement to completion and buffers the result
/// rows; later steps walk that buffer. Values handed out by
/// [`column_value`](RawStatement::column_value) borrow the current row.
pub struct SqliteStatement<'c> {
    statement: rusqlite::Statement<'c>,
    rows: VecDeque<Vec<Value>>,
    current: Option<Vec<Value>>,
    executed: bool,
}

impl<'c> SqliteStatement<'c> {
    fn new(statement: rusqlite::Statement<'c>) -> Self {
        Self {
            statement,
            rows: VecDeque::new(),
            current: None,
            executed: false,
        }
    }

    fn run(&mut self) -> Result<VecDeque<Vec<Value>>> {
        let column_count = self.statement.column_count();
        let mut buffered = VecDeque::new();
        let mut rows = self.statement.raw_query();
        while let Some(row) = rows.next().map_err(execution_error)? {
            let mut values = Vec::with_capacity(column_count);
            for index in 0..column_count {
                let value = match row.get_ref(index).map_err(execution_error)? {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(v) => Value::Integer(v),
                    ValueRef::Real(v) => Value::Real(v),
                    // TEXT that is not valid UTF-8 keeps its bytes and only decodes as a blob
                    ValueRef::Text(v) => match std::str::from_utf8(v) {
                        Ok(text) => Value::Text(text.to_owned()),
                        Err(_) => Value::Blob(v.to_vec()),
                    },
                    ValueRef::Blob(v) => Value::Blob(v.to_vec()),
                };
                values.push(value);
            }
            buffered.push_back(values);
        }
        Ok(buffered)
    }
}

impl RawStatement for SqliteStatement<'_> {
    fn parameter_count(&self) -> usize {
        self.statement.parameter_count()
    }

    fn bind(&mut self, index: usize, value: DatabaseValue<'_>) -> Result<()> {
        let value = match value {
            DatabaseValue::Null => ValueRef::Null,
            DatabaseValue::Integer(v) => ValueRef::Integer(v),
            DatabaseValue::Real(v) => ValueRef::Real(v),
            DatabaseValue::Text(s) => ValueRef::Text(s.as_bytes()),
            DatabaseValue::Blob(b) => ValueRef::Blob(b),
        };
        // SQLite parameters are 1-based
        self.statement
            .raw_bind_parameter(index + 1, ToSqlOutput::Borrowed(value))
            .map_err(|e| DatabaseError::bind(index, e.to_string()))
    }

    fn step(&mut self) -> Result<Step> {
        if !self.executed {
            self.rows = self.run()?;
            self.executed = true;
        }
        self.current = self.rows.pop_front();
        Ok(if self.current.is_some() {
            Step::Row
        } else {
            Step::Done
        })
    }

    fn column_count(&self) -> usize {
        self.statement.column_count()
    }

    fn column_value(&self, index: usize) -> Result<DatabaseValue<'_>> {
        let row = self.current.as_deref().unwrap_or_default();
        let value = row.get(index).ok_or(DatabaseError::ColumnOutOfRange {
            index,
            count: row.len(),
        })?;
        Ok(match value {
            Value::Null => DatabaseValue::Null,
            Value::Integer(v) => DatabaseValue::Integer(*v),
            Value::Real(v) => DatabaseValue::Real(*v),
            Value::Text(s) => DatabaseValue::Text(s),
            Value::Blob(b) => DatabaseValue::Blob(b),
        })
    }

    fn reset(&mut self) -> Result<()> {
        self.rows.clear();
        self.current = None;
        self.executed = false;
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<()> {
        self.statement.finalize().map_err(DatabaseError::from)
    }
}
