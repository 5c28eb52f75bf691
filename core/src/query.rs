use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use pdugraph_proto::{CheckpointId, ContextId, Destination, Origin, Pdu, PduRef};
use tracing::{debug, warn};

use crate::{
    error::{RetrievalError, ValidationError},
    storage::{ContextStorage, PduFilter, StorageEngine},
    validate::validate_context,
};

/// Read-only access to stored PDUs.
pub struct QueryService {
    storage: Arc<dyn StorageEngine>,
}

impl QueryService {
    pub fn new(storage: Arc<dyn StorageEngine>) -> Self { Self { storage } }

    /// PDUs delivered to `destination` after the checkpoint, in the order they were sent.
    ///
    /// Used to catch a destination up after a connectivity gap. A PDU carried by more than one later
    /// delivery is returned once, at its first position.
    pub async fn events_after_checkpoint(
        &self,
        origin: &Origin,
        checkpoint: &CheckpointId,
        destination: &Destination,
    ) -> Result<Vec<Pdu>, RetrievalError> {
        if origin.is_empty() {
            return Err(ValidationError::MissingOrigin.into());
        }
        if checkpoint.is_empty() {
            return Err(ValidationError::EmptyCheckpoint.into());
        }
        if destination.is_empty() {
            return Err(ValidationError::EmptyDestination.into());
        }

        let keys = self.storage.deliveries_after(origin, checkpoint, destination).await?;
        debug!(%origin, %checkpoint, %destination, keys = keys.len(), "events after checkpoint");

        let mut seen = HashSet::new();
        let mut contexts: HashMap<ContextId, Arc<dyn ContextStorage>> = HashMap::new();
        let mut pdus = Vec::with_capacity(keys.len());
        for key in keys {
            if !seen.insert(key.clone()) {
                continue;
            }
            let storage = match contexts.get(&key.context) {
                Some(storage) => storage.clone(),
                None => {
                    let storage = self.storage.context(&key.context).await?;
                    contexts.insert(key.context.clone(), storage.clone());
                    storage
                }
            };
            match storage.get_event(&key.pdu).await? {
                Some(pdu) => pdus.push(pdu),
                None => warn!(%key, "delivered PDU is not stored"),
            }
        }
        Ok(pdus)
    }

    /// Every state PDU of the context, each exactly once.
    pub async fn state_events_for_context(&self, context: &ContextId) -> Result<Vec<Pdu>, RetrievalError> {
        validate_context(context)?;
        Ok(self.storage.context(context).await?.list_events(PduFilter::State).await?)
    }

    pub async fn event(&self, context: &ContextId, pdu_ref: &PduRef) -> Result<Option<Pdu>, RetrievalError> {
        validate_context(context)?;
        Ok(self.storage.context(context).await?.get_event(pdu_ref).await?)
    }

    /// All PDUs of the context in insertion order
    pub async fn events(&self, context: &ContextId) -> Result<Vec<Pdu>, RetrievalError> {
        validate_context(context)?;
        Ok(self.storage.context(context).await?.list_events(PduFilter::All).await?)
    }
}
