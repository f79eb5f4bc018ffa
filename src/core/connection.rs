//! Driver-agnostic connection handle

use super::backend::{Backend, Driver};
use super::error::Result;
use super::statement::Statement;
use std::cell::Cell;
use tracing::{debug, trace};

/// An open connection to one database
///
/// A connection is used by one thread at a time. It is `Send`, so a pool can
/// hand it to whichever thread checks it out.
pub struct Connection {
    backend: Box<dyn Backend>,
    in_transaction: Cell<bool>,
}

impl Connection {
    /// Open a connection with driver `D`
    pub fn open<D: Driver>(options: &D::Options) -> Result<Self> {
        let backend = D::open(options)?;
        debug!(backend = backend.name(), "connection opened");
        Ok(Self::from_backend(Box::new(backend)))
    }

    /// Wrap an already opened backend
    pub fn from_backend(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            in_transaction: Cell::new(false),
        }
    }

    /// Name of the driver behind this connection
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Compile `sql` into a statement
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        trace!(sql, "prepare");
        let raw = self.backend.prepare(sql)?;
        Ok(Statement::new(raw))
    }

    /// Run parameterless SQL, possibly several statements
    pub fn exec_all(&self, sql: &str) -> Result<()> {
        trace!(sql, "exec_all");
        self.backend.exec_all(sql)
    }

    /// Row id generated by the most recent INSERT
    pub fn last_insert_rowid(&self) -> i64 {
        self.backend.last_insert_rowid()
    }

    /// Rows changed by the most recent INSERT, UPDATE or DELETE
    pub fn rows_affected(&self) -> u64 {
        self.backend.rows_affected()
    }

    /// Whether a transaction guard is open on this connection, from any session
    pub fn in_transaction(&self) -> bool {
        self.in_transaction.get()
    }

    pub(crate) fn set_in_transaction(&self, active: bool) {
        self.in_transaction.set(active);
    }

    /// Close the connection
    ///
    /// Dropping a connection also closes it, but swallows driver errors.
    pub fn close(self) -> Result<()> {
        let name = self.backend.name();
        self.backend.close()?;
        debug!(backend = name, "connection closed");
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &self.backend.name())
            .field("in_transaction", &self.in_transaction.get())
            .finish()
    }
}
