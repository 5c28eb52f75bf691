//! Key layout for the shared trees.
//!
//! Every string component is written as a big-endian `u32` length followed by its bytes, so a
//! context's keys share an unambiguous prefix and arbitrary strings can never collide.
//! Sequence numbers are big-endian `u64` so byte order matches insertion order.

use pdugraph_proto::{CheckpointId, ContextId, Destination, Origin, PduRef};

use crate::error::SledError;

#[derive(Default)]
pub struct KeyBuilder(Vec<u8>);

impl KeyBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn str(mut self, value: &str) -> Self {
        self.0.extend_from_slice(&(value.len() as u32).to_be_bytes());
        self.0.extend_from_slice(value.as_bytes());
        self
    }

    pub fn pdu(self, pdu_ref: &PduRef) -> Self { self.str(pdu_ref.id.as_str()).str(pdu_ref.origin.as_str()) }

    pub fn seq(mut self, seq: u64) -> Self {
        self.0.extend_from_slice(&seq.to_be_bytes());
        self
    }

    pub fn build(self) -> Vec<u8> { self.0 }
}

pub fn context_prefix(context: &ContextId) -> Vec<u8> { KeyBuilder::new().str(context.as_str()).build() }

/// `context | id | origin`
pub fn pdu_key(context: &ContextId, pdu_ref: &PduRef) -> Vec<u8> { KeyBuilder::new().str(context.as_str()).pdu(pdu_ref).build() }

/// `context | seq`
pub fn event_key(context: &ContextId, seq: u64) -> Vec<u8> { KeyBuilder::new().str(context.as_str()).seq(seq).build() }

/// `context | child | parent`
pub fn edge_key(context: &ContextId, child: &PduRef, parent: &PduRef) -> Vec<u8> {
    KeyBuilder::new().str(context.as_str()).pdu(child).pdu(parent).build()
}

/// `origin | checkpoint`, the prefix of every delivery index key for one checkpoint
pub fn checkpoint_prefix(origin: &Origin, checkpoint: &CheckpointId) -> Vec<u8> {
    KeyBuilder::new().str(origin.as_str()).str(checkpoint.as_str()).build()
}

/// `origin | checkpoint | destination`
pub fn delivery_index_key(origin: &Origin, checkpoint: &CheckpointId, destination: &Destination) -> Vec<u8> {
    KeyBuilder::new().str(origin.as_str()).str(checkpoint.as_str()).str(destination.as_str()).build()
}

pub fn seq_key(seq: u64) -> [u8; 8] { seq.to_be_bytes() }

pub fn decode_seq(bytes: &[u8], tree: &'static str) -> Result<u64, SledError> {
    let bytes: [u8; 8] = bytes.try_into().map_err(|_| SledError::Malformed(tree))?;
    Ok(u64::from_be_bytes(bytes))
}
