//! # pdugraph
//!
//! Tracks the causal graph of PDUs (persistent data units) exchanged between federated servers.
//! Every PDU belongs to a context and names the PDUs it was created after. pdugraph stores those
//! events and the edges between them, and keeps each context's forward extremities: the PDUs
//! nobody has built on yet, which become the predecessors of the next locally authored PDU.
//!
//! ## Core Concepts
//!
//! - **Context**: An independent causal log, such as a room
//! - **PDU**: An immutable event with an `(id, origin)` identity and a list of predecessors
//! - **Extremity**: A PDU in the context's frontier; no known PDU lists it as a predecessor
//! - **Delivery**: One outbound transmission to a destination, identified by a checkpoint
//!
//! ## Example
//!
//! ```rust
//! # use pdugraph::{proto::OutgoingPdu, storage::MemoryStorageEngine, PduGraph};
//! # use std::sync::Arc;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = PduGraph::new(Arc::new(MemoryStorageEngine::new()));
//!
//! let first = graph.tracker().register_outgoing(OutgoingPdu::new("!room", "a.example", "m.message", vec![])).await?;
//! let second = graph.tracker().register_outgoing(OutgoingPdu::new("!room", "a.example", "m.message", vec![])).await?;
//! assert_eq!(second.predecessors, vec![first.pdu_ref()]);
//!
//! // Once the second PDU is delivered, the first one leaves the frontier
//! graph.tracker().confirm_sent(&second).await?;
//! assert_eq!(graph.tracker().current_frontier(&"!room".into()).await?.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage
//!
//! [`storage::MemoryStorageEngine`] is always available. Durable engines are behind features:
//! `sled` re-exports `pdugraph-storage-sled` as [`sled`] and `sqlite` re-exports
//! `pdugraph-storage-sqlite` as [`sqlite`].

pub use pdugraph_core as core;
pub use pdugraph_proto as proto;

pub use pdugraph_core::{
    delivery::DeliveryLog,
    error::{MutationError, RetrievalError, StorageError, ValidationError},
    graph::PduGraph,
    query::QueryService,
    storage,
    tracker::ExtremityTracker,
};

#[cfg(feature = "sled")]
pub use pdugraph_storage_sled as sled;
#[cfg(feature = "sqlite")]
pub use pdugraph_storage_sqlite as sqlite;
