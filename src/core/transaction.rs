//! Transaction guard for automatic rollback on drop
//!
//! This module provides RAII-style transaction management with automatic rollback.

use super::error::{DatabaseError, Result};
use super::session::Session;
use std::ops::Deref;
use tracing::{debug, warn};

/// Transaction guard that automatically rolls back on drop if not committed
///
/// The guard dereferences to its [`Session`], so every session operation can
/// run inside the transaction. A connection holds at most one open guard, even
/// across sessions sharing it; a second `begin` fails instead of nesting.
///
/// # Example
///
/// ```
/// use rust_record_store::prelude::*;
///
/// # fn main() -> Result<()> {
/// let session = Session::open::<SqliteDriver>(&SqliteOptions::memory())?;
/// session.exec_all("CREATE TABLE accounts (id INTEGER PRIMARY KEY, balance REAL)")?;
///
/// let tx = session.transaction()?;
/// tx.exec("INSERT INTO accounts (balance) VALUES (?)", (100.0,))?;
/// tx.commit()?;
///
/// let balance: Option<f64> = session.get("SELECT balance FROM accounts", ())?;
/// assert_eq!(balance, Some(100.0));
/// # Ok(())
/// # }
/// ```
pub struct TransactionGuard<'s, 'c> {
    session: &'s Session<'c>,
    finished: bool,
}

impl<'s, 'c> TransactionGuard<'s, 'c> {
    /// Begin a new transaction
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A transaction is already active on this session's connection
    /// - The backend rejects `BEGIN`
    pub fn begin(session: &'s Session<'c>) -> Result<Self> {
        if session.in_transaction() {
            return Err(DatabaseError::transaction("Transaction already active"));
        }
        session.exec_all("BEGIN")?;
        session.connection().set_in_transaction(true);
        debug!("transaction started");

        Ok(Self {
            session,
            finished: false,
        })
    }

    /// Commit the transaction
    ///
    /// If the commit fails the guard is dropped unfinished and rolls back.
    pub fn commit(mut self) -> Result<()> {
        self.session.exec_all("COMMIT")?;
        self.finish();
        debug!("transaction committed");
        Ok(())
    }

    /// Explicitly roll back the transaction
    pub fn rollback(mut self) -> Result<()> {
        let result = self.session.exec_all("ROLLBACK");
        self.finish();
        debug!("transaction rolled back");
        result
    }

    fn finish(&mut self) {
        self.finished = true;
        self.session.connection().set_in_transaction(false);
    }
}

impl<'c> Deref for TransactionGuard<'_, 'c> {
    type Target = Session<'c>;

    fn deref(&self) -> &Session<'c> {
        self.session
    }
}

impl std::fmt::Debug for TransactionGuard<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionGuard")
            .field("session", self.session)
            .field("finished", &self.finished)
            .finish()
    }
}

impl Drop for TransactionGuard<'_, '_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!("transaction dropped without commit or rollback; rolling back");
        if let Err(e) = self.session.exec_all("ROLLBACK") {
            warn!(error = %e, "automatic rollback failed");
        }
        self.finish();
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::backends::{SqliteDriver, SqliteOptions};
    use crate::core::connection::Connection;

    fn session() -> Session<'static> {
        let session = Session::open::<SqliteDriver>(&SqliteOptions::memory()).unwrap();
        session
            .exec_all("CREATE TABLE test (id INTEGER PRIMARY KEY, value TEXT)")
            .unwrap();
        session
    }

    fn count(session: &Session<'_>) -> i64 {
        session
            .get("SELECT COUNT(*) FROM test", ())
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_transaction_guard_commit() {
        let session = session();
        {
            let tx = session.transaction().unwrap();
            tx.exec("INSERT INTO test (value) VALUES (?)", ("test1",))
                .unwrap();
            tx.commit().unwrap();
        }
        assert_eq!(count(&session), 1);
        assert!(!session.in_transaction());
    }

    #[test]
    fn test_transaction_guard_rollback_on_drop() {
        let session = session();
        {
            let tx = session.transaction().unwrap();
            tx.exec("INSERT INTO test (value) VALUES (?)", ("test1",))
                .unwrap();
        }
        assert_eq!(count(&session), 0);
        assert!(!session.in_transaction());
    }

    #[test]
    fn test_transaction_guard_explicit_rollback() {
        let session = session();
        let tx = session.transaction().unwrap();
        tx.exec("INSERT INTO test (value) VALUES (?)", ("test1",))
            .unwrap();
        tx.rollback().unwrap();
        assert_eq!(count(&session), 0);
    }

    #[test]
    fn test_nested_begin_rejected() {
        let session = session();
        let _tx = session.transaction().unwrap();
        let err = session.transaction().unwrap_err();
        assert!(matches!(err, DatabaseError::Transaction(_)));
    }

    #[test]
    fn test_guard_debug_output() {
        let session = session();
        let tx = session.transaction().unwrap();
        let debug = format!("{:?}", tx);
        assert!(debug.starts_with("TransactionGuard"));
        assert!(debug.contains("finished: false"));
    }

    #[test]
    fn test_transaction_tracked_per_connection() {
        let connection = Connection::open::<SqliteDriver>(&SqliteOptions::memory()).unwrap();
        let first = Session::new(&connection);
        let second = Session::new(&connection);

        let tx = first.transaction().unwrap();
        assert!(second.in_transaction());
        let err = second.transaction().unwrap_err();
        assert_eq!(err.kind(), crate::core::error::ErrorKind::ResourceState);
        assert!(matches!(err, DatabaseError::Transaction(_)));

        tx.commit().unwrap();
        assert!(!second.in_transaction());
        second.transaction().unwrap().rollback().unwrap();
    }
}
