//! Incremental maintenance of each context's forward frontier.
//!
//! The frontier (the set of extremities) is never recomputed from the graph. It changes in exactly two ways:
//! - every registered PDU joins it, unless a known edge already names that PDU as a parent
//! - predecessors leave it, immediately for PDUs received from peers, and only on [`ExtremityTracker::confirm_sent`]
//!   for PDUs authored here, since an unacknowledged send may never reach anyone

use std::{collections::BTreeSet, sync::Arc};

use pdugraph_proto::{ContextId, OutgoingPdu, Pdu, PduRef};
use tracing::{debug, instrument};

use crate::{
    error::{MutationError, RetrievalError, StorageError},
    storage::{ContextStorage, Registration, RegistrationOutcome, StorageEngine},
    validate::{validate_context, validate_outgoing, validate_pdu},
};

mod locks;

use locks::ContextLocks;

pub struct ExtremityTracker {
    storage: Arc<dyn StorageEngine>,
    locks: ContextLocks,
}

impl ExtremityTracker {
    pub fn new(storage: Arc<dyn StorageEngine>) -> Self { Self { storage, locks: ContextLocks::default() } }

    async fn context(&self, id: &ContextId) -> Result<Arc<dyn ContextStorage>, StorageError> { self.storage.context(id).await }

    /// A snapshot of the context's current extremities.
    pub async fn current_frontier(&self, context: &ContextId) -> Result<BTreeSet<PduRef>, RetrievalError> {
        validate_context(context)?;
        let storage = self.context(context).await?;
        let _guard = self.locks.read(context).await;
        Ok(storage.extremities().await?)
    }

    /// Stamp a locally authored PDU with the current frontier as its predecessors and register it.
    ///
    /// The PDU joins the frontier but its predecessors stay until [`Self::confirm_sent`]. Re-registering an identity
    /// that is already stored returns the stored PDU unchanged, so a retry never restamps.
    #[instrument(skip_all, fields(context = %pdu.context, pdu = %pdu.pdu_ref()))]
    pub async fn register_outgoing(&self, pdu: OutgoingPdu) -> Result<Pdu, MutationError> {
        validate_outgoing(&pdu)?;
        let storage = self.context(&pdu.context).await?;
        let _guard = self.locks.write(&pdu.context).await;

        if let Some(stored) = storage.get_event(&pdu.pdu_ref()).await? {
            let retried = pdu.stamp(stored.predecessors.clone());
            if retried != stored {
                return Err(StorageError::ConflictingPdu(stored.key()).into());
            }
            debug!("already registered");
            return Ok(stored);
        }

        let frontier = storage.extremities().await?;
        let stamped = pdu.stamp(frontier.into_iter().collect());
        validate_pdu(&stamped)?;

        let outcome = storage.register(Registration::outgoing(stamped.clone())).await?;
        debug!(predecessors = stamped.predecessors.len(), ?outcome, "registered outgoing");
        Ok(stamped)
    }

    /// Register a PDU received from a peer, retiring its predecessors from the frontier immediately.
    ///
    /// If a successor of this PDU arrived first, the PDU is stored but does not join the frontier.
    #[instrument(skip_all, fields(context = %pdu.context, pdu = %pdu.pdu_ref()))]
    pub async fn register_remote(&self, pdu: Pdu) -> Result<RegistrationOutcome, MutationError> {
        validate_pdu(&pdu)?;
        let storage = self.context(&pdu.context).await?;
        let _guard = self.locks.write(&pdu.context).await;

        let outcome = storage.register(Registration::remote(pdu)).await?;
        if outcome.inserted && !outcome.added_extremity {
            debug!("already superseded by a known successor");
        }
        debug!(?outcome, "registered remote");
        Ok(outcome)
    }

    /// Delivery of a locally authored PDU succeeded: retire the predecessors it superseded.
    ///
    /// Idempotent; predecessors that are no longer extremities are skipped. Returns how many were retired.
    #[instrument(skip_all, fields(context = %pdu.context, pdu = %pdu.pdu_ref()))]
    pub async fn confirm_sent(&self, pdu: &Pdu) -> Result<usize, MutationError> {
        validate_pdu(pdu)?;
        if pdu.predecessors.is_empty() {
            return Ok(0);
        }
        let storage = self.context(&pdu.context).await?;
        let _guard = self.locks.write(&pdu.context).await;

        let retired = storage.retire_extremities(&pdu.predecessors).await?;
        debug!(retired, requested = pdu.predecessors.len(), "confirmed sent");
        Ok(retired)
    }
}
