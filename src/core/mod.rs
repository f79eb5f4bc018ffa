//! Core types and traits
//!
//! This module provides the driver-agnostic engine: record reflection, value
//! marshaling, the backend contract, connections, pooling, statements,
//! sessions and the query builder.

pub mod arena;
pub mod backend;
pub mod connection;
pub mod error;
pub mod marshal;
pub mod pool;
pub mod query_builder;
pub mod reflect;
pub mod session;
pub mod statement;
pub mod transaction;
pub mod value;

// Re-export commonly used types
pub use arena::Arena;
pub use backend::{Backend, Driver, RawStatement, Step};
pub use connection::Connection;
pub use error::{DatabaseError, ErrorKind, Result};
pub use marshal::{Assignable, FromSql, Json, Null, ToSql};
pub use pool::{ExhaustedPolicy, Pool, PoolConfig, PoolStats, PooledConnection};
pub use query_builder::{Operator, OrderDirection, Query};
pub use reflect::{Columns, FromRow, Partial, Row, Table};
pub use session::{ConnectionHandle, Session};
pub use statement::{Params, Statement};
pub use transaction::TransactionGuard;
pub use value::DatabaseValue;
