//! SQLite backend for the membership engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every operation is planned, validated
//! and written inside a single `IMMEDIATE` transaction.

mod encode;
mod load;
mod schema;
mod source;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use source::SqlRoles;
pub use store::SqliteStore;
