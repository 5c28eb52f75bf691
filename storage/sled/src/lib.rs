//! Sled storage engine for pdugraph
//!
//! All contexts share one set of trees; every key starts with the length-prefixed context id.
//! Registrations run as a single multi-tree sled transaction, so an event, its edges and the
//! resulting frontier become visible together or not at all.
//!
//! ```rust,ignore
//! use pdugraph_storage_sled::SledStorageEngine;
//!
//! let storage = SledStorageEngine::with_homedir_folder(".pdugraph")?;
//! // or a temporary database for tests
//! let storage = SledStorageEngine::new_test()?;
//! ```

mod context;
mod database;
mod engine;
mod error;
mod keys;

pub use context::SledContextStorage;
pub use database::Database;
pub use engine::SledStorageEngine;
pub use error::SledError;
