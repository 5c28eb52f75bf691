pub mod delivery;
pub mod id;
pub mod pdu;

pub use delivery::*;
pub use id::*;
pub use pdu::*;
