use serde::{Deserialize, Serialize};

use crate::{
    id::{CheckpointId, Destination, Origin},
    pdu::PduKey,
};

/// One outbound transmission of PDUs to a destination, identified by its checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub origin: Origin,
    pub checkpoint: CheckpointId,
    pub destination: Destination,
    pub pdus: Vec<PduKey>,
}

impl Delivery {
    pub fn new(origin: impl Into<Origin>, checkpoint: impl Into<CheckpointId>, destination: impl Into<Destination>) -> Self {
        Self { origin: origin.into(), checkpoint: checkpoint.into(), destination: destination.into(), pdus: Vec::new() }
    }

    pub fn with_pdus(mut self, pdus: impl IntoIterator<Item = PduKey>) -> Self {
        self.pdus.extend(pdus);
        self
    }
}

impl std::fmt::Display for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Delivery({} {} -> {}, {} pdus)", self.checkpoint, self.origin, self.destination, self.pdus.len())
    }
}
