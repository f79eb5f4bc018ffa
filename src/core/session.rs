//! Arena-scoped sessions
//!
//! A [`Session`] pairs one connection with one [`Arena`]. All text and blob
//! payloads read or written during the session are copied into the arena, so
//! records decoded with borrowed fields (`&str`, `&[u8]`) stay valid for as
//! long as the session and are freed together when it ends.
//!
//! ```
//! use rust_record_store::prelude::*;
//!
//! record! {
//!     #[derive(Debug)]
//!     pub struct Person<'a> {
//!         pub id: i64,
//!         pub name: &'a str,
//!     }
//! }
//!
//! partial! {
//!     pub struct NewPerson<'a> for Person<'a> {
//!         pub name: &'a str,
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let session = Session::open::<SqliteDriver>(&SqliteOptions::memory())?;
//! session.exec_all("CREATE TABLE Person (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")?;
//!
//! let id = session.insert::<Person, _>(&NewPerson { name: "Alice" })?;
//! let alice: Person = session.find(id)?.unwrap();
//! assert_eq!(alice.name, "Alice");
//! # Ok(())
//! # }
//! ```

use super::arena::Arena;
use super::backend::Driver;
use super::connection::Connection;
use super::error::Result;
use super::marshal::{FromSql, ToSql};
use super::pool::PooledConnection;
use super::query_builder::Query;
use super::reflect::{FromRow, Partial, Table};
use super::statement::{Params, Statement};
use super::transaction::TransactionGuard;
use std::ops::Deref;
use tracing::trace;

/// Where a session's connection comes from
pub enum ConnectionHandle<'c> {
    /// Opened by the session and closed when it ends
    Owned(Connection),
    /// Borrowed from the caller
    Borrowed(&'c Connection),
    /// Checked out of a pool and returned when the session ends
    Pooled(PooledConnection<'c>),
}

impl Deref for ConnectionHandle<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            ConnectionHandle::Owned(connection) => connection,
            ConnectionHandle::Borrowed(connection) => connection,
            ConnectionHandle::Pooled(connection) => connection,
        }
    }
}

/// One connection plus the arena for everything read or written through it
pub struct Session<'c> {
    arena: Arena,
    connection: ConnectionHandle<'c>,
}

impl Session<'static> {
    /// Open a connection with driver `D` and own it for the session's lifetime
    pub fn open<D: Driver>(options: &D::Options) -> Result<Self> {
        let connection = Connection::open::<D>(options)?;
        Ok(Self::with_handle(ConnectionHandle::Owned(connection)))
    }

    /// Take ownership of an open connection
    pub fn from_connection(connection: Connection) -> Self {
        Self::with_handle(ConnectionHandle::Owned(connection))
    }
}

impl<'c> Session<'c> {
    /// Start a session on a borrowed connection
    pub fn new(connection: &'c Connection) -> Self {
        Self::with_handle(ConnectionHandle::Borrowed(connection))
    }

    /// Start a session on a pooled connection
    pub fn from_pooled(connection: PooledConnection<'c>) -> Self {
        Self::with_handle(ConnectionHandle::Pooled(connection))
    }

    fn with_handle(connection: ConnectionHandle<'c>) -> Self {
        Self {
            arena: Arena::new(),
            connection,
        }
    }

    /// The session's connection
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Whether the session closes its connection when it ends
    pub fn owns_connection(&self) -> bool {
        matches!(self.connection, ConnectionHandle::Owned(_))
    }

    /// The session arena
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Bytes currently held by the session arena
    pub fn allocated_bytes(&self) -> usize {
        self.arena.allocated_bytes()
    }

    /// Free everything in the arena
    ///
    /// Takes `&mut self`, so no value borrowed from the session can survive it.
    pub fn reset_arena(&mut self) {
        self.arena.reset();
    }

    /// Prepare `sql` and bind `params` to its placeholders
    pub fn prepare<P: Params>(&self, sql: &str, params: P) -> Result<Statement<'_>> {
        let mut statement = self.connection.prepare(sql)?;
        statement.bind_all(params, &self.arena)?;
        Ok(statement)
    }

    /// Run a statement to completion
    pub fn exec<P: Params>(&self, sql: &str, params: P) -> Result<()> {
        self.prepare(sql, params)?.exec()
    }

    /// Run parameterless SQL, possibly several statements
    pub fn exec_all(&self, sql: &str) -> Result<()> {
        self.connection.exec_all(sql)
    }

    /// First column of the first row, or `None` when there are no rows
    pub fn get<'s, T, P>(&'s self, sql: &str, params: P) -> Result<Option<T>>
    where
        T: FromSql<'s>,
        P: Params,
    {
        let mut statement = self.prepare(sql, params)?;
        match statement.next_row(&self.arena)? {
            Some(row) => row.get(0).map(Some),
            None => Ok(None),
        }
    }

    /// Decode every row of a query
    pub fn fetch_all<'s, R, P>(&'s self, sql: &str, params: P) -> Result<Vec<R>>
    where
        R: FromRow<'s>,
        P: Params,
    {
        self.prepare(sql, params)?.collect(&self.arena)
    }

    /// Decode the first row of a query
    pub fn fetch_one<'s, R, P>(&'s self, sql: &str, params: P) -> Result<Option<R>>
    where
        R: FromRow<'s>,
        P: Params,
    {
        self.prepare(sql, params)?.next(&self.arena)
    }

    /// Start a query against table `T`
    pub fn query<T: Table>(&self) -> Query<'_, T> {
        Query::new(&self.connection, &self.arena)
    }

    /// Load the record with primary key `id`
    pub fn find<'s, T>(&'s self, id: impl ToSql + 's) -> Result<Option<T>>
    where
        T: Table + FromRow<'s>,
    {
        self.query::<T>().find(id)
    }

    /// Insert a payload into `T`'s table and return the new row id
    pub fn insert<T, D>(&self, data: &D) -> Result<i64>
    where
        T: Table,
        D: Partial<T>,
    {
        self.query::<T>().insert(data)
    }

    /// Update the row with primary key `id`, returning rows affected
    pub fn update<'s, T, D>(&'s self, id: impl ToSql + 's, data: &D) -> Result<u64>
    where
        T: Table,
        D: Partial<T>,
    {
        self.query::<T>().where_eq(T::PRIMARY_KEY, id).update(data)
    }

    /// Delete the row with primary key `id`, returning rows affected
    pub fn delete<'s, T>(&'s self, id: impl ToSql + 's) -> Result<u64>
    where
        T: Table,
    {
        self.query::<T>().where_eq(T::PRIMARY_KEY, id).delete()
    }

    /// Row id generated by the most recent INSERT
    pub fn last_insert_rowid(&self) -> i64 {
        self.connection.last_insert_rowid()
    }

    /// Rows changed by the most recent INSERT, UPDATE or DELETE
    pub fn rows_affected(&self) -> u64 {
        self.connection.rows_affected()
    }

    /// Begin a transaction that rolls back unless committed
    pub fn transaction(&self) -> Result<TransactionGuard<'_, 'c>> {
        TransactionGuard::begin(self)
    }

    /// Whether a transaction guard is open on the session's connection
    ///
    /// The flag lives on the connection, so sessions sharing a borrowed
    /// connection see each other's transactions.
    pub fn in_transaction(&self) -> bool {
        self.connection.in_transaction()
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        trace!(
            arena_bytes = self.arena.allocated_bytes(),
            owned = self.owns_connection(),
            "session ended"
        );
    }
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connection", &*self.connection)
            .field("arena", &self.arena)
            .finish()
    }
}
