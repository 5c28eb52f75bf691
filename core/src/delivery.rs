use std::sync::Arc;

use pdugraph_proto::Delivery;
use tracing::debug;

use crate::{error::MutationError, storage::StorageEngine, validate::validate_delivery};

/// Records which PDUs each outbound delivery carried, so a destination can later be caught up
/// with [`crate::QueryService::events_after_checkpoint`].
pub struct DeliveryLog {
    storage: Arc<dyn StorageEngine>,
}

impl DeliveryLog {
    pub fn new(storage: Arc<dyn StorageEngine>) -> Self { Self { storage } }

    /// Returns false if this `(origin, checkpoint, destination)` was already recorded.
    pub async fn record(&self, delivery: &Delivery) -> Result<bool, MutationError> {
        validate_delivery(delivery)?;
        let recorded = self.storage.record_delivery(delivery).await?;
        debug!(%delivery, recorded, "record delivery");
        Ok(recorded)
    }
}
