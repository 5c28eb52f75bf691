use std::{collections::BTreeSet, str::FromStr};

use pdugraph_core::proto::{ContextId, OutgoingPdu, Pdu, PduRef};
use tracing::Level;

// Initialize tracing for tests
#[ctor::ctor]
fn init_tracing() {
    // if LOG_LEVEL env var is set, use it
    if let Ok(level) = std::env::var("LOG_LEVEL") {
        tracing_subscriber::fmt().with_max_level(Level::from_str(&level).unwrap()).with_test_writer().init();
    } else {
        tracing_subscriber::fmt().with_max_level(Level::INFO).with_test_writer().init();
    }
}

pub const LOCAL: &str = "a.example";
/// Pinned origin timestamp so that rebuilding a PDU from the same id yields an identical value
#[allow(unused)]
pub const TS: u64 = 1_700_000_000_000;
#[allow(unused)]
pub const REMOTE: &str = "b.example";

pub fn room() -> ContextId { "!room".into() }

#[allow(unused)]
pub fn outgoing(id: &str) -> OutgoingPdu { OutgoingPdu::new(room(), LOCAL, "m.message", id.as_bytes().to_vec()).with_id(id).with_ts(TS) }

#[allow(unused)]
pub fn remote_pdu(id: &str, preds: &[PduRef]) -> Pdu {
    OutgoingPdu::new(room(), REMOTE, "m.message", id.as_bytes().to_vec()).with_id(id).with_ts(TS).stamp(preds.to_vec())
}

#[allow(unused)]
pub fn set(refs: &[PduRef]) -> BTreeSet<PduRef> { refs.iter().cloned().collect() }
