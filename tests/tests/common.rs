use std::{collections::BTreeSet, sync::Arc};

use anyhow::Result;
use tracing::Level;

#[allow(unused)]
pub use pdugraph::{
    proto::{ContextId, Delivery, OutgoingPdu, Pdu, PduKey, PduRef},
    storage::{MemoryStorageEngine, StorageEngine},
    MutationError, PduGraph, RetrievalError, StorageError, ValidationError,
};
use pdugraph_storage_sled::SledStorageEngine;
use pdugraph_storage_sqlite::SqliteStorageEngine;

// Initialize tracing for tests
#[ctor::ctor]
fn init_tracing() { tracing_subscriber::fmt().with_max_level(Level::INFO).with_test_writer().init(); }

pub const LOCAL: &str = "a.example";
/// Pinned origin timestamp so that rebuilding a PDU from the same id yields an identical value
#[allow(unused)]
pub const TS: u64 = 1_700_000_000_000;
#[allow(unused)]
pub const REMOTE: &str = "b.example";

/// A graph over each storage engine, labelled for assertion messages
pub async fn all_engines() -> Result<Vec<(&'static str, PduGraph)>> {
    Ok(vec![
        ("memory", PduGraph::new(Arc::new(MemoryStorageEngine::new()))),
        ("sled", PduGraph::new(Arc::new(SledStorageEngine::new_test()?))),
        ("sqlite", PduGraph::new(Arc::new(SqliteStorageEngine::open_in_memory().await?))),
    ])
}

pub fn room() -> ContextId { "!room".into() }

#[allow(unused)]
pub fn outgoing(id: &str) -> OutgoingPdu { OutgoingPdu::new(room(), LOCAL, "m.message", id.as_bytes().to_vec()).with_id(id).with_ts(TS) }

#[allow(unused)]
pub fn remote_pdu(id: &str, preds: &[PduRef]) -> Pdu {
    OutgoingPdu::new(room(), REMOTE, "m.message", id.as_bytes().to_vec()).with_id(id).with_ts(TS).stamp(preds.to_vec())
}

#[allow(unused)]
pub fn remote_state(id: &str, preds: &[PduRef]) -> Pdu {
    OutgoingPdu::new(room(), REMOTE, "m.room.member", id.as_bytes().to_vec()).with_id(id).with_ts(TS).state().stamp(preds.to_vec())
}

#[allow(unused)]
pub fn refs(pdus: &[&Pdu]) -> BTreeSet<PduRef> { pdus.iter().map(|p| p.pdu_ref()).collect() }

#[allow(unused)]
pub fn ids(pdus: &[Pdu]) -> Vec<String> { pdus.iter().map(|p| p.id.to_string()).collect() }
