//! # Rust Record Store
//!
//! A typed data-access layer over SQL engines. Plain Rust structs are mapped
//! to table rows at compile time, every column reference is checked against
//! the record it names, and reads and writes run through arena-scoped
//! sessions on pooled connections.
//!
//! ## Features
//!
//! - **Compile-time reflection**: [`record!`] and [`partial!`] derive column
//!   lists, placeholder strings and `SET` clauses as constants
//! - **Checked assignment**: a partial record only compiles when each field's
//!   type can be stored in the target column
//! - **Arena sessions**: decoded text and blobs borrow from the session arena,
//!   so records can hold `&str` and `&[u8]` fields without copying
//! - **Connection pooling**: bounded pool with blocking or failing checkout
//! - **Query builder**: immutable, fluent, always parameterized
//! - **Pluggable backends**: SQLite bundled, others behind the [`Driver`] trait
//!
//! ## Quick Start
//!
//! ```rust
//! use rust_record_store::prelude::*;
//!
//! record! {
//!     #[derive(Debug)]
//!     pub struct User<'a> as "users" {
//!         pub id: i64,
//!         pub name: &'a str,
//!         pub age: i64,
//!     }
//! }
//!
//! partial! {
//!     pub struct NewUser<'a> for User<'a> {
//!         pub name: &'a str,
//!         pub age: i64,
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let session = Session::open::<SqliteDriver>(&SqliteOptions::memory())?;
//! session.exec_all(
//!     "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER NOT NULL)",
//! )?;
//!
//! session.insert::<User, _>(&NewUser { name: "Alice", age: 30 })?;
//! session.insert::<User, _>(&NewUser { name: "Bob", age: 25 })?;
//!
//! let adults: Vec<User> = session
//!     .query::<User>()
//!     .where_ge(col!(User, age), 18)
//!     .order_by_asc(col!(User, name))
//!     .find_all()?;
//! assert_eq!(adults.len(), 2);
//! assert_eq!(adults[0].name, "Alice");
//! # Ok(())
//! # }
//! ```
//!
//! ## Project Structure
//!
//! ```text
//! rust_record_store/
//! ├── src/
//! │   ├── core/              # Driver-agnostic engine
//! │   │   ├── arena.rs       # Session arena
//! │   │   ├── backend.rs     # Driver contract
//! │   │   ├── connection.rs  # Type-erased connection
//! │   │   ├── error.rs       # Error types
//! │   │   ├── marshal.rs     # ToSql / FromSql / Assignable
//! │   │   ├── pool.rs        # Connection pool
//! │   │   ├── query_builder.rs
//! │   │   ├── reflect.rs     # record! / partial! / col!
//! │   │   ├── session.rs
//! │   │   ├── statement.rs
//! │   │   ├── transaction.rs
//! │   │   └── value.rs       # Borrowed database values
//! │   ├── backends/
//! │   │   └── sqlite.rs
//! │   └── lib.rs
//! ├── demos/                 # Example programs
//! ├── tests/                 # Integration tests
//! └── benches/
//! ```

/// Core record-store types and traits
pub mod core;

/// Database backend implementations
pub mod backends;

/// Prelude for convenient imports
///
/// ```rust
/// use rust_record_store::prelude::*;
///
/// # fn main() -> Result<()> {
/// let session = Session::open::<SqliteDriver>(&SqliteOptions::memory())?;
/// let two: Option<i64> = session.get("SELECT 1 + 1", ())?;
/// assert_eq!(two, Some(2));
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::core::{
        Arena, Assignable, Columns, Connection, DatabaseError, DatabaseValue, Driver,
        ErrorKind, ExhaustedPolicy, FromRow, FromSql, Json, Null, Operator, OrderDirection,
        Partial, Pool, PoolConfig, Query, Result, Row, Session, Table, ToSql,
        TransactionGuard,
    };
    pub use crate::{col, params, partial, record, sql_enum};

    #[cfg(feature = "sqlite")]
    pub use crate::backends::{SqliteDriver, SqliteOptions};
}

// Re-export at root level for convenience
pub use self::core::{
    Arena, Assignable, Backend, Columns, Connection, ConnectionHandle, DatabaseError,
    DatabaseValue, Driver, ErrorKind, ExhaustedPolicy, FromRow, FromSql, Json, Null, Operator,
    OrderDirection, Params, Partial, Pool, PoolConfig, PoolStats, PooledConnection, Query,
    RawStatement, Result, Row, Session, Statement, Step, Table, ToSql, TransactionGuard,
};

#[cfg(feature = "sqlite")]
pub use backends::{SqliteDriver, SqliteOptions};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        use prelude::*;

        let arena = Arena::new();
        let val = 42i64.to_sql(&arena).unwrap();
        assert_eq!(val.as_integer(), Some(42));

        let val = "test".to_sql(&arena).unwrap();
        assert_eq!(val.as_text(), Some("test"));

        let val = true.to_sql(&arena).unwrap();
        assert!(bool::from_sql(val).unwrap());
    }

    #[test]
    fn test_error_kinds() {
        let err = DatabaseError::unknown_column("users", "nmae");
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.to_string().contains("nmae"));
    }
}
