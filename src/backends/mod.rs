//! Database backend implementations
//!
//! This module contains concrete drivers implementing the
//! [`Driver`](crate::core::backend::Driver) and
//! [`Backend`](crate::core::backend::Backend) traits.

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteDriver, SqliteOptions, SqliteStatement};
