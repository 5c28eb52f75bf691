//! In-process storage engine. Nothing survives the process; intended for tests and ephemeral nodes.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use dashmap::DashMap;
use pdugraph_proto::{CheckpointId, ContextId, Delivery, Destination, Edge, Origin, Pdu, PduKey, PduRef};

use super::{check_existing, ContextStorage, PduFilter, Registration, RegistrationOutcome, StorageEngine};
use crate::error::StorageError;

type ContextMap = DashMap<ContextId, Arc<Mutex<ContextTables>>>;

/// Contexts get tables on their first write; reading an unknown context allocates nothing.
#[derive(Default)]
pub struct MemoryStorageEngine {
    contexts: Arc<ContextMap>,
    deliveries: Mutex<DeliveryLogTable>,
}

#[derive(Default)]
struct DeliveryLogTable {
    /// In sequence order
    entries: Vec<Delivery>,
    recorded: HashSet<(Origin, CheckpointId, Destination)>,
}

impl MemoryStorageEngine {
    pub fn new() -> Self { Self::default() }

    #[cfg(test)]
    pub(crate) fn context_count(&self) -> usize { self.contexts.len() }
}

#[async_trait]
impl StorageEngine for MemoryStorageEngine {
    async fn context(&self, id: &ContextId) -> Result<Arc<dyn ContextStorage>, StorageError> {
        Ok(Arc::new(MemoryContextStorage { context_id: id.clone(), contexts: self.contexts.clone() }))
    }

    async fn record_delivery(&self, delivery: &Delivery) -> Result<bool, StorageError> {
        let mut log = self.deliveries.lock().expect("Failed to lock the delivery log");
        let key = (delivery.origin.clone(), delivery.checkpoint.clone(), delivery.destination.clone());
        if !log.recorded.insert(key) {
            return Ok(false);
        }
        log.entries.push(delivery.clone());
        Ok(true)
    }

    async fn deliveries_after(
        &self,
        origin: &Origin,
        checkpoint: &CheckpointId,
        destination: &Destination,
    ) -> Result<Vec<PduKey>, StorageError> {
        let log = self.deliveries.lock().expect("Failed to lock the delivery log");
        Ok(keys_after_checkpoint(log.entries.iter(), origin, checkpoint, destination))
    }

    async fn delete_all(&self) -> Result<bool, StorageError> {
        let mut log = self.deliveries.lock().expect("Failed to lock the delivery log");
        let any = !log.entries.is_empty() || !self.contexts.is_empty();
        *log = DeliveryLogTable::default();
        self.contexts.clear();
        Ok(any)
    }
}

/// A handle onto one context's tables. Handles are cheap and resolve the tables on every call.
pub struct MemoryContextStorage {
    context_id: ContextId,
    contexts: Arc<ContextMap>,
}

// One lock over every table of the context makes each registration atomic
#[derive(Default)]
struct ContextTables {
    events: HashMap<PduRef, Pdu>,
    insertion_order: Vec<PduRef>,
    /// parent -> children
    successors: BTreeMap<PduRef, BTreeSet<PduRef>>,
    extremities: BTreeSet<PduRef>,
}

impl ContextTables {
    fn put_event(&mut self, pdu: &Pdu) -> Result<bool, StorageError> {
        let pdu_ref = pdu.pdu_ref();
        if !check_existing(self.events.get(&pdu_ref), pdu)? {
            return Ok(false);
        }
        self.insertion_order.push(pdu_ref.clone());
        self.events.insert(pdu_ref, pdu.clone());
        Ok(true)
    }

    fn add_edge(&mut self, edge: &Edge) -> bool { self.successors.entry(edge.parent.clone()).or_default().insert(edge.child.clone()) }

    fn has_successor(&self, pdu_ref: &PduRef) -> bool { self.successors.get(pdu_ref).is_some_and(|children| !children.is_empty()) }

    fn retire(&mut self, refs: &[PduRef]) -> usize { refs.iter().filter(|r| self.extremities.remove(*r)).count() }
}

impl MemoryContextStorage {
    fn existing(&self) -> Option<Arc<Mutex<ContextTables>>> {
        // clone the Arc out so the map shard is not held under the table lock
        self.contexts.get(&self.context_id).map(|entry| entry.value().clone())
    }

    /// Run `f` against the tables if the context has any; otherwise answer as an empty context would.
    fn read<T: Default>(&self, f: impl FnOnce(&ContextTables) -> T) -> T {
        let Some(tables) = self.existing() else {
            return T::default();
        };
        let tables = tables.lock().expect("Failed to lock context tables");
        f(&tables)
    }

    fn write<T>(&self, f: impl FnOnce(&mut ContextTables) -> T) -> T {
        let tables = self.contexts.entry(self.context_id.clone()).or_default().clone();
        let mut tables = tables.lock().expect("Failed to lock context tables");
        f(&mut tables)
    }
}

#[async_trait]
impl ContextStorage for MemoryContextStorage {
    fn context_id(&self) -> &ContextId { &self.context_id }

    async fn put_event(&self, pdu: &Pdu) -> Result<bool, StorageError> { self.write(|tables| tables.put_event(pdu)) }

    async fn get_event(&self, pdu_ref: &PduRef) -> Result<Option<Pdu>, StorageError> { Ok(self.read(|tables| tables.events.get(pdu_ref).cloned())) }

    async fn list_events(&self, filter: PduFilter) -> Result<Vec<Pdu>, StorageError> {
        Ok(self.read(|tables| {
            tables.insertion_order.iter().filter_map(|r| tables.events.get(r)).filter(|pdu| filter.matches(pdu)).cloned().collect()
        }))
    }

    async fn add_edge(&self, edge: &Edge) -> Result<bool, StorageError> { Ok(self.write(|tables| tables.add_edge(edge))) }

    async fn has_successor(&self, pdu_ref: &PduRef) -> Result<bool, StorageError> { Ok(self.read(|tables| tables.has_successor(pdu_ref))) }

    async fn successors(&self, pdu_ref: &PduRef) -> Result<Vec<PduRef>, StorageError> {
        Ok(self.read(|tables| tables.successors.get(pdu_ref).map(|children| children.iter().cloned().collect()).unwrap_or_default()))
    }

    async fn extremities(&self) -> Result<BTreeSet<PduRef>, StorageError> { Ok(self.read(|tables| tables.extremities.clone())) }

    async fn retire_extremities(&self, refs: &[PduRef]) -> Result<usize, StorageError> {
        let Some(tables) = self.existing() else {
            return Ok(0);
        };
        let retired = tables.lock().expect("Failed to lock context tables").retire(refs);
        Ok(retired)
    }

    async fn register(&self, registration: Registration) -> Result<RegistrationOutcome, StorageError> {
        let Registration { pdu, retire } = registration;
        let pdu_ref = pdu.pdu_ref();
        self.write(|tables| {
            // put_event fails before anything is written, so a conflict leaves the tables untouched
            let inserted = tables.put_event(&pdu)?;
            for edge in pdu.edges() {
                tables.add_edge(&edge);
            }
            let added_extremity = !tables.has_successor(&pdu_ref) && tables.extremities.insert(pdu_ref);
            let retired = tables.retire(&retire);

            Ok(RegistrationOutcome { inserted, added_extremity, retired })
        })
    }
}

/// Locate the checkpoint in a sequence-ordered delivery log and collect what `origin` sent to `destination` after it.
fn keys_after_checkpoint<'a>(
    deliveries: impl IntoIterator<Item = &'a Delivery>,
    origin: &Origin,
    checkpoint: &CheckpointId,
    destination: &Destination,
) -> Vec<PduKey> {
    let mut found = false;
    let mut keys = Vec::new();
    for delivery in deliveries {
        if !found {
            found = delivery.origin == *origin && delivery.checkpoint == *checkpoint;
            continue;
        }
        if delivery.origin == *origin && delivery.destination == *destination {
            keys.extend(delivery.pdus.iter().cloned());
        }
    }
    keys
}
