//! Causal event graph core: per-context frontier tracking over a pluggable storage engine.

pub mod delivery;
pub mod error;
pub mod graph;
pub mod query;
pub mod storage;
pub mod tracker;
pub mod validate;

pub use delivery::DeliveryLog;
pub use graph::PduGraph;
pub use query::QueryService;
pub use tracker::ExtremityTracker;

pub use pdugraph_proto as proto;
