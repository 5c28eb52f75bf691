//! SQLite storage engine for pdugraph
//!
//! Stores the `events`, `edges` and `extremities` relations, plus the delivery log, in a single
//! SQLite database. Every registration runs in one immediate transaction, so an event, its
//! edges and the frontier change it causes commit together.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdugraph_storage_sqlite::SqliteStorageEngine;
//!
//! // Open a file-based database
//! let storage = SqliteStorageEngine::open("pdugraph.db").await?;
//!
//! // Or use an in-memory database for testing
//! let storage = SqliteStorageEngine::open_in_memory().await?;
//! ```

mod connection;
mod context;
mod engine;
mod error;
mod schema;

pub use connection::{SqliteConfig, SqliteConnectionManager};
pub use context::SqliteContextStorage;
pub use engine::{SqlitePool, SqliteStorageEngine, DEFAULT_POOL_SIZE};
pub use error::SqliteError;
