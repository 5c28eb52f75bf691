use serde::{Deserialize, Serialize};

use crate::id::{ContextId, Origin, PduId};

/// The identity pair of a PDU: unique within a context.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PduRef {
    pub id: PduId,
    pub origin: Origin,
}

impl PduRef {
    pub fn new(id: impl Into<PduId>, origin: impl Into<Origin>) -> Self { Self { id: id.into(), origin: origin.into() } }
}

impl std::fmt::Display for PduRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}@{}", self.id, self.origin) }
}

/// A PDU reference qualified by its context, for bookkeeping that spans contexts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PduKey {
    pub context: ContextId,
    pub pdu: PduRef,
}

impl PduKey {
    pub fn new(context: impl Into<ContextId>, pdu: PduRef) -> Self { Self { context: context.into(), pdu } }
}

impl std::fmt::Display for PduKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}/{}", self.context, self.pdu) }
}

/// A single immutable event in a context's causal log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pdu {
    pub context: ContextId,
    pub id: PduId,
    pub origin: Origin,
    pub pdu_type: String,
    /// Origin timestamp, milliseconds since the unix epoch
    pub ts: u64,
    pub is_state: bool,
    /// The events this PDU was created after. Empty only for a context's genesis event.
    pub predecessors: Vec<PduRef>,
    pub payload: Vec<u8>,
}

impl Pdu {
    pub fn pdu_ref(&self) -> PduRef { PduRef { id: self.id.clone(), origin: self.origin.clone() } }

    pub fn key(&self) -> PduKey { PduKey { context: self.context.clone(), pdu: self.pdu_ref() } }

    pub fn is_genesis(&self) -> bool { self.predecessors.is_empty() }

    /// The edges this PDU contributes to its context's graph, one per predecessor.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        let child = self.pdu_ref();
        self.predecessors.iter().map(move |parent| Edge { context: self.context.clone(), child: child.clone(), parent: parent.clone() })
    }
}

impl std::fmt::Display for Pdu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Pdu({}/{}@{} {}", self.context, self.id, self.origin, self.pdu_type)?;
        if !self.predecessors.is_empty() {
            let preds: Vec<String> = self.predecessors.iter().map(|p| p.to_string()).collect();
            write!(f, " after [{}]", preds.join(", "))?;
        }
        write!(f, ")")
    }
}

/// A locally authored PDU whose predecessors have not been stamped yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingPdu {
    pub context: ContextId,
    pub id: PduId,
    pub origin: Origin,
    pub pdu_type: String,
    pub ts: u64,
    pub is_state: bool,
    pub payload: Vec<u8>,
}

impl OutgoingPdu {
    /// A new outgoing PDU with a freshly generated id, timestamped now.
    ///
    /// A retried send must reuse the same value; a fresh one carries a different id or timestamp.
    pub fn new(context: impl Into<ContextId>, origin: impl Into<Origin>, pdu_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            context: context.into(),
            id: PduId::generate(),
            origin: origin.into(),
            pdu_type: pdu_type.into(),
            ts: now_millis(),
            is_state: false,
            payload,
        }
    }

    pub fn with_id(mut self, id: impl Into<PduId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_ts(mut self, ts: u64) -> Self {
        self.ts = ts;
        self
    }

    pub fn state(mut self) -> Self {
        self.is_state = true;
        self
    }

    pub fn pdu_ref(&self) -> PduRef { PduRef { id: self.id.clone(), origin: self.origin.clone() } }

    /// Stamp the predecessor list, producing the immutable PDU.
    pub fn stamp(self, predecessors: Vec<PduRef>) -> Pdu {
        Pdu {
            context: self.context,
            id: self.id,
            origin: self.origin,
            pdu_type: self.pdu_type,
            ts: self.ts,
            is_state: self.is_state,
            predecessors,
            payload: self.payload,
        }
    }
}

fn now_millis() -> u64 { u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0) }

/// A causal edge, directed from successor (child) to predecessor (parent).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub context: ContextId,
    pub child: PduRef,
    pub parent: PduRef,
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}: {} -> {}", self.context, self.child, self.parent) }
}
