use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;
use pdugraph_proto::{CheckpointId, ContextId, Delivery, Destination, Edge, Origin, Pdu, PduKey, PduRef};

use crate::error::StorageError;

mod memory;
pub use memory::MemoryStorageEngine;

#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Opens and/or creates the storage scoped to one context.
    async fn context(&self, id: &ContextId) -> Result<Arc<dyn ContextStorage>, StorageError>;

    /// Append a delivery. Returns false if `(origin, checkpoint, destination)` was already recorded.
    async fn record_delivery(&self, delivery: &Delivery) -> Result<bool, StorageError>;

    /// PDU keys carried from `origin` to `destination` by deliveries recorded after the checkpoint, in insertion order.
    /// The checkpoint is the earliest delivery recorded under `(origin, checkpoint)`; if there is none the result is empty.
    async fn deliveries_after(
        &self,
        origin: &Origin,
        checkpoint: &CheckpointId,
        destination: &Destination,
    ) -> Result<Vec<PduKey>, StorageError>;

    /// Delete all contexts, deliveries and their data from the storage engine
    async fn delete_all(&self) -> Result<bool, StorageError>;
}

/// Durable events, edges and extremities of a single context.
#[async_trait]
pub trait ContextStorage: Send + Sync {
    fn context_id(&self) -> &ContextId;

    /// Idempotent upsert. Returns true if the PDU was newly stored.
    async fn put_event(&self, pdu: &Pdu) -> Result<bool, StorageError>;

    async fn get_event(&self, pdu_ref: &PduRef) -> Result<Option<Pdu>, StorageError>;

    /// PDUs matching the filter, in insertion order
    async fn list_events(&self, filter: PduFilter) -> Result<Vec<Pdu>, StorageError>;

    /// Idempotent. Returns true if the edge was new.
    async fn add_edge(&self, edge: &Edge) -> Result<bool, StorageError>;

    /// True iff some known edge names `pdu_ref` as its parent.
    async fn has_successor(&self, pdu_ref: &PduRef) -> Result<bool, StorageError>;

    async fn successors(&self, pdu_ref: &PduRef) -> Result<Vec<PduRef>, StorageError>;

    /// The stored frontier.
    async fn extremities(&self) -> Result<BTreeSet<PduRef>, StorageError>;

    /// Removes whichever of `refs` are extremities and returns how many were removed.
    async fn retire_extremities(&self, refs: &[PduRef]) -> Result<usize, StorageError>;

    /// Apply a registration as one atomic unit: event, edges, extremity membership and retirements.
    async fn register(&self, registration: Registration) -> Result<RegistrationOutcome, StorageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduFilter {
    All,
    State,
}

impl PduFilter {
    pub fn matches(&self, pdu: &Pdu) -> bool {
        match self {
            PduFilter::All => true,
            PduFilter::State => pdu.is_state,
        }
    }
}

/// The unit of work behind every PDU registration.
///
/// Storage engines apply it atomically, in this order:
/// 1. store the event (identical content is a no-op, different content is [`StorageError::ConflictingPdu`])
/// 2. add one edge per predecessor
/// 3. add the PDU as an extremity unless some known edge already names it as a parent
/// 4. retire every extremity listed in `retire`
#[derive(Debug, Clone)]
pub struct Registration {
    pub pdu: Pdu,
    pub retire: Vec<PduRef>,
}

impl Registration {
    /// A locally authored PDU: its predecessors stay in the frontier until the send is confirmed.
    pub fn outgoing(pdu: Pdu) -> Self { Self { pdu, retire: Vec::new() } }

    /// A PDU received from a peer proves each predecessor has a successor.
    pub fn remote(pdu: Pdu) -> Self {
        let retire = pdu.predecessors.clone();
        Self { pdu, retire }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationOutcome {
    /// False when the same PDU was already stored
    pub inserted: bool,
    /// False when the PDU was already superseded by a known successor, or already an extremity
    pub added_extremity: bool,
    pub retired: usize,
}

/// Compare a newly registered PDU against whatever is stored under its identity.
/// Returns whether the new PDU still needs to be written.
pub fn check_existing(existing: Option<&Pdu>, pdu: &Pdu) -> Result<bool, StorageError> {
    match existing {
        None => Ok(true),
        Some(stored) if stored == pdu => Ok(false),
        Some(_) => Err(StorageError::ConflictingPdu(pdu.key())),
    }
}
