//! Backend traits
//!
//! This module defines the contract every SQL engine driver must implement.
//! The generic layer ([`Connection`](super::connection::Connection),
//! [`Statement`](super::statement::Statement), sessions and pools) only ever
//! talks to a driver through these traits.

use super::error::Result;
use super::value::DatabaseValue;

/// Result of advancing a statement by one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A result row is available
    Row,
    /// The statement has finished
    Done,
}

/// Driver-side prepared statement
///
/// Bind indices are zero-based; drivers that count from one translate
/// internally.
pub trait RawStatement {
    /// Number of `?` placeholders in the SQL text
    fn parameter_count(&self) -> usize;

    /// Bind `value` to the placeholder at `index`
    ///
    /// The driver must copy text and blob payloads; `value` is only guaranteed
    /// to live for the duration of the call.
    fn bind(&mut self, index: usize, value: DatabaseValue<'_>) -> Result<()>;

    /// Advance to the next row or completion
    fn step(&mut self) -> Result<Step>;

    /// Number of columns in each result row
    fn column_count(&self) -> usize;

    /// Column value of the current row
    ///
    /// The returned value may borrow driver buffers and is only valid until the
    /// next call to [`step`](RawStatement::step).
    fn column_value(&self, index: usize) -> Result<DatabaseValue<'_>>;

    /// Rewind so the statement can be stepped again; bindings are kept
    fn reset(&mut self) -> Result<()>;

    /// Release the driver resources held by the statement
    fn finalize(self: Box<Self>) -> Result<()>;
}

/// Object-safe driver interface
///
/// This is what a [`Connection`](super::connection::Connection) holds. Each
/// backend value is used by one thread at a time; it only needs to be `Send`
/// so pools can hand it between threads.
pub trait Backend: Send {
    /// Short driver name for logging
    fn name(&self) -> &'static str;

    /// Compile `sql` into a statement bound to this connection
    fn prepare<'c>(&'c self, sql: &str) -> Result<Box<dyn RawStatement + 'c>>;

    /// Run one or more `;`-separated statements without parameters
    fn exec_all(&self, sql: &str) -> Result<()>;

    /// Row id generated by the most recent successful INSERT
    fn last_insert_rowid(&self) -> i64;

    /// Rows changed by the most recent INSERT, UPDATE or DELETE
    fn rows_affected(&self) -> u64;

    /// Close the connection, reporting any driver failure
    fn close(self: Box<Self>) -> Result<()>;
}

/// A concrete driver that can open connections
///
/// Kept separate from [`Backend`] because opening is generic over the driver's
/// option type and therefore not object-safe.
pub trait Driver: Backend + Sized + 'static {
    /// Connection options understood by this driver
    type Options: Send + Sync + 'static;

    /// Open a new connection
    fn open(options: &Self::Options) -> Result<Self>;
}
