use pdugraph_core::error::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SledError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("malformed stored value in tree {0}")]
    Malformed(&'static str),

    #[error("task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl From<SledError> for StorageError {
    fn from(err: SledError) -> Self {
        match err {
            SledError::Bincode(e) => StorageError::SerializationError(Box::new(e)),
            other => StorageError::BackendError(Box::new(other)),
        }
    }
}

pub fn sled_error(err: sled::Error) -> StorageError { SledError::Sled(err).into() }
