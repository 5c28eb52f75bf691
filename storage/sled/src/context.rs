use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;
use pdugraph_core::{
    error::StorageError,
    storage::{check_existing, ContextStorage, PduFilter, Registration, RegistrationOutcome},
};
use pdugraph_proto::{ContextId, Edge, Pdu, PduRef};
use serde::de::DeserializeOwned;
use sled::{
    transaction::{ConflictableTransactionError, TransactionError, TransactionalTree},
    Transactional,
};
use tokio::task;
use tracing::debug;

use crate::{
    database::Database,
    error::{sled_error, SledError},
    keys::{context_prefix, decode_seq, edge_key, event_key, pdu_key, seq_key},
};

type TxResult<T> = Result<T, ConflictableTransactionError<StorageError>>;

#[derive(Clone)]
pub struct SledContextStorage {
    pub context_id: ContextId,
    pub database: Arc<Database>,
    prefix: Vec<u8>,
}

impl SledContextStorage {
    pub fn new(context_id: ContextId, database: Arc<Database>) -> Self {
        let prefix = context_prefix(&context_id);
        Self { context_id, database, prefix }
    }

    /// sled is synchronous, so every call runs on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(Self) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let me = self.clone();
        task::spawn_blocking(move || f(me)).await.map_err(SledError::from)?
    }
}

#[async_trait]
impl ContextStorage for SledContextStorage {
    fn context_id(&self) -> &ContextId { &self.context_id }

    async fn put_event(&self, pdu: &Pdu) -> Result<bool, StorageError> {
        let pdu = pdu.clone();
        self.blocking(move |me| me.put_event_blocking(&pdu)).await
    }

    async fn get_event(&self, pdu_ref: &PduRef) -> Result<Option<Pdu>, StorageError> {
        let pdu_ref = pdu_ref.clone();
        self.blocking(move |me| me.get_event_blocking(&pdu_ref)).await
    }

    async fn list_events(&self, filter: PduFilter) -> Result<Vec<Pdu>, StorageError> {
        self.blocking(move |me| me.list_events_blocking(filter)).await
    }

    async fn add_edge(&self, edge: &Edge) -> Result<bool, StorageError> {
        let edge = edge.clone();
        self.blocking(move |me| me.add_edge_blocking(&edge)).await
    }

    async fn has_successor(&self, pdu_ref: &PduRef) -> Result<bool, StorageError> {
        let key = pdu_key(&self.context_id, pdu_ref);
        self.blocking(move |me| me.database.successors_tree.contains_key(key).map_err(sled_error)).await
    }

    async fn successors(&self, pdu_ref: &PduRef) -> Result<Vec<PduRef>, StorageError> {
        let key = pdu_key(&self.context_id, pdu_ref);
        self.blocking(move |me| {
            let children: BTreeSet<PduRef> = match me.database.successors_tree.get(key).map_err(sled_error)? {
                Some(value) => decode(&value)?,
                None => BTreeSet::new(),
            };
            Ok(children.into_iter().collect())
        })
        .await
    }

    async fn extremities(&self) -> Result<BTreeSet<PduRef>, StorageError> {
        self.blocking(move |me| match me.database.extremities_tree.get(&me.prefix).map_err(sled_error)? {
            Some(value) => decode(&value),
            None => Ok(BTreeSet::new()),
        })
        .await
    }

    async fn retire_extremities(&self, refs: &[PduRef]) -> Result<usize, StorageError> {
        let refs = refs.to_vec();
        self.blocking(move |me| me.retire_extremities_blocking(&refs)).await
    }

    async fn register(&self, registration: Registration) -> Result<RegistrationOutcome, StorageError> {
        self.blocking(move |me| me.register_blocking(&registration)).await
    }
}

impl SledContextStorage {
    fn put_event_blocking(&self, pdu: &Pdu) -> Result<bool, StorageError> {
        let bytes = encode(pdu)?;
        let db = &self.database;
        finish((&db.events_tree, &db.event_index_tree).transaction(|(events, index)| tx_put_event(events, index, &self.context_id, pdu, &bytes)))
    }

    fn get_event_blocking(&self, pdu_ref: &PduRef) -> Result<Option<Pdu>, StorageError> {
        let Some(seq) = self.database.event_index_tree.get(pdu_key(&self.context_id, pdu_ref)).map_err(sled_error)? else {
            return Ok(None);
        };
        let seq = decode_seq(&seq, "event_index")?;
        match self.database.events_tree.get(event_key(&self.context_id, seq)).map_err(sled_error)? {
            Some(value) => Ok(Some(decode(&value)?)),
            None => Err(SledError::Malformed("events").into()),
        }
    }

    fn list_events_blocking(&self, filter: PduFilter) -> Result<Vec<Pdu>, StorageError> {
        let mut pdus = Vec::new();
        // keys are `context | seq`, so a prefix scan yields insertion order
        for entry in self.database.events_tree.scan_prefix(&self.prefix) {
            let (_key, value) = entry.map_err(sled_error)?;
            let pdu: Pdu = decode(&value)?;
            if filter.matches(&pdu) {
                pdus.push(pdu);
            }
        }
        Ok(pdus)
    }

    fn add_edge_blocking(&self, edge: &Edge) -> Result<bool, StorageError> {
        let db = &self.database;
        finish((&db.edges_tree, &db.successors_tree).transaction(|(edges, successors)| tx_add_edge(edges, successors, &self.context_id, edge)))
    }

    fn retire_extremities_blocking(&self, refs: &[PduRef]) -> Result<usize, StorageError> {
        let retired = finish(self.database.extremities_tree.transaction(|extremities| {
            let mut frontier = tx_extremities(extremities, &self.prefix)?;
            let retired = refs.iter().filter(|r| frontier.remove(*r)).count();
            if retired > 0 {
                tx_store_extremities(extremities, &self.prefix, &frontier)?;
            }
            Ok(retired)
        }))?;
        debug!(context = %self.context_id, retired, requested = refs.len(), "sled retire extremities");
        Ok(retired)
    }

    fn register_blocking(&self, registration: &Registration) -> Result<RegistrationOutcome, StorageError> {
        let Registration { pdu, retire } = registration;
        let bytes = encode(pdu)?;
        let pdu_ref = pdu.pdu_ref();
        let edges: Vec<Edge> = pdu.edges().collect();
        let db = &self.database;

        let trees = (&db.events_tree, &db.event_index_tree, &db.edges_tree, &db.successors_tree, &db.extremities_tree);
        let outcome = finish(trees.transaction(|(events, index, edge_tree, successors, extremities)| {
            let inserted = tx_put_event(events, index, &self.context_id, pdu, &bytes)?;
            for edge in &edges {
                tx_add_edge(edge_tree, successors, &self.context_id, edge)?;
            }

            let mut frontier = tx_extremities(extremities, &self.prefix)?;
            let superseded = successors.get(pdu_key(&self.context_id, &pdu_ref))?.is_some();
            let added_extremity = !superseded && frontier.insert(pdu_ref.clone());
            let retired = retire.iter().filter(|r| frontier.remove(*r)).count();
            if added_extremity || retired > 0 {
                tx_store_extremities(extremities, &self.prefix, &frontier)?;
            }

            Ok(RegistrationOutcome { inserted, added_extremity, retired })
        }))?;
        debug!(context = %self.context_id, pdu = %pdu_ref, ?outcome, "sled register");
        Ok(outcome)
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StorageError> { Ok(bincode::serialize(value).map_err(SledError::from)?) }

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> { Ok(bincode::deserialize(bytes).map_err(SledError::from)?) }

fn abort(err: impl Into<StorageError>) -> ConflictableTransactionError<StorageError> { ConflictableTransactionError::Abort(err.into()) }

fn finish<T>(result: Result<T, TransactionError<StorageError>>) -> Result<T, StorageError> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(err)) => Err(err),
        Err(TransactionError::Storage(err)) => Err(sled_error(err)),
    }
}

fn tx_put_event(events: &TransactionalTree, index: &TransactionalTree, context: &ContextId, pdu: &Pdu, bytes: &[u8]) -> TxResult<bool> {
    let key = pdu_key(context, &pdu.pdu_ref());
    if let Some(seq) = index.get(&key)? {
        let seq = decode_seq(&seq, "event_index").map_err(abort)?;
        let stored = events.get(event_key(context, seq))?.ok_or_else(|| abort(SledError::Malformed("events")))?;
        let stored: Pdu = decode(&stored).map_err(ConflictableTransactionError::Abort)?;
        return check_existing(Some(&stored), pdu).map_err(ConflictableTransactionError::Abort);
    }

    let seq = events.generate_id()?;
    events.insert(event_key(context, seq), bytes)?;
    index.insert(key, &seq_key(seq)[..])?;
    Ok(true)
}

fn tx_add_edge(edges: &TransactionalTree, successors: &TransactionalTree, context: &ContextId, edge: &Edge) -> TxResult<bool> {
    let key = edge_key(context, &edge.child, &edge.parent);
    if edges.get(&key)?.is_some() {
        return Ok(false);
    }
    edges.insert(key, &[] as &[u8])?;

    let parent_key = pdu_key(context, &edge.parent);
    let mut children: BTreeSet<PduRef> = match successors.get(&parent_key)? {
        Some(value) => decode(&value).map_err(ConflictableTransactionError::Abort)?,
        None => BTreeSet::new(),
    };
    children.insert(edge.child.clone());
    successors.insert(parent_key, encode(&children).map_err(ConflictableTransactionError::Abort)?)?;
    Ok(true)
}

fn tx_extremities(extremities: &TransactionalTree, prefix: &[u8]) -> TxResult<BTreeSet<PduRef>> {
    match extremities.get(prefix)? {
        Some(value) => decode(&value).map_err(ConflictableTransactionError::Abort),
        None => Ok(BTreeSet::new()),
    }
}

fn tx_store_extremities(extremities: &TransactionalTree, prefix: &[u8], frontier: &BTreeSet<PduRef>) -> TxResult<()> {
    if frontier.is_empty() {
        extremities.remove(prefix)?;
    } else {
        extremities.insert(prefix, encode(frontier).map_err(ConflictableTransactionError::Abort)?)?;
    }
    Ok(())
}
