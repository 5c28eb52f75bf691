//! Error types for pdugraph.
//!
//! Storage engines map their driver errors into [`StorageError`]. Public operations
//! return [`MutationError`] (writes) or [`RetrievalError`] (reads).

use pdugraph_proto::{PduKey, PduRef};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The identity is already stored with different content. PDUs are immutable.
    #[error("conflicting content for already registered PDU {0}")]
    ConflictingPdu(PduKey),

    #[error("serialization error: {0}")]
    SerializationError(Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("backend error: {0}")]
    BackendError(Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// Malformed input, rejected before any write.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("context is empty")]
    EmptyContext,

    #[error("PDU is missing its id")]
    MissingId,

    #[error("PDU is missing its origin")]
    MissingOrigin,

    #[error("PDU {0} lists itself as a predecessor")]
    SelfReference(PduRef),

    #[error("predecessor {0} is listed more than once")]
    DuplicatePredecessor(PduRef),

    #[error("predecessor reference has an empty id or origin")]
    EmptyPredecessor,

    #[error("destination is empty")]
    EmptyDestination,

    #[error("checkpoint is empty")]
    EmptyCheckpoint,
}

/// Error type for operations that write: registrations, confirmations and delivery records.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Error type for read operations.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl MutationError {
    /// Storage failures are safe to retry; the writes behind them are idempotent.
    pub fn is_retryable(&self) -> bool { matches!(self, MutationError::Storage(StorageError::BackendError(_))) }
}
