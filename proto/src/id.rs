use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Declares a string-backed identifier with the conversions every id in this crate shares.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }

            pub fn as_str(&self) -> &str { &self.0 }

            pub fn is_empty(&self) -> bool { self.0.is_empty() }
        }

        impl From<&str> for $name {
            fn from(val: &str) -> Self { Self(val.to_string()) }
        }

        impl From<String> for $name {
            fn from(val: String) -> Self { Self(val) }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self { id.0 }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str { &self.0 }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool { self.0 == other }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
        }
    };
}

string_id!(
    /// The logical stream a PDU belongs to. All edge and frontier state is scoped per context.
    ContextId
);

string_id!(
    /// Identifier of a PDU, unique per origin.
    PduId
);

string_id!(
    /// The server that authored a PDU or a delivery.
    Origin
);

string_id!(Destination);

string_id!(
    /// Opaque marker of one outbound delivery; catch-up resumes after it.
    CheckpointId
);

impl PduId {
    /// Mint a fresh id for a locally authored PDU
    pub fn generate() -> Self { PduId(Ulid::new().to_string()) }
}

impl CheckpointId {
    pub fn generate() -> Self { CheckpointId(Ulid::new().to_string()) }
}
