//! Error types for SQLite storage engine

use pdugraph_core::error::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqliteError {
    #[error("SQLite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Task join error: {0}")]
    TaskJoin(String),

    /// A storage-level outcome raised inside a transaction, such as a conflicting PDU
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<SqliteError> for StorageError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Storage(e) => e,
            SqliteError::Serialization(e) => StorageError::SerializationError(Box::new(e)),
            other => StorageError::BackendError(Box::new(other)),
        }
    }
}
