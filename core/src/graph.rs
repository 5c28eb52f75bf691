use std::sync::Arc;

use crate::{delivery::DeliveryLog, query::QueryService, storage::StorageEngine, tracker::ExtremityTracker};

/// The components of a causal event graph, sharing one storage engine.
pub struct PduGraph {
    storage: Arc<dyn StorageEngine>,
    tracker: ExtremityTracker,
    queries: QueryService,
    deliveries: DeliveryLog,
}

impl PduGraph {
    pub fn new(storage: Arc<dyn StorageEngine>) -> Self {
        Self {
            tracker: ExtremityTracker::new(storage.clone()),
            queries: QueryService::new(storage.clone()),
            deliveries: DeliveryLog::new(storage.clone()),
            storage,
        }
    }

    pub fn storage(&self) -> &Arc<dyn StorageEngine> { &self.storage }

    pub fn tracker(&self) -> &ExtremityTracker { &self.tracker }

    pub fn queries(&self) -> &QueryService { &self.queries }

    pub fn deliveries(&self) -> &DeliveryLog { &self.deliveries }
}
