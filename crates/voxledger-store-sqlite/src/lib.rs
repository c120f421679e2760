//! SQLite backend for the voxledger billing store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Idempotency is carried by the schema's
//! uniqueness constraints, so the store stays correct when several gateway
//! instances share one database file.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
