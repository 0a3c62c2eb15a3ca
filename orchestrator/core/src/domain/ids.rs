// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Entity identifiers
//!
//! Every stored entity is keyed by an opaque 32-hex-digit id. Each entity kind
//! gets its own newtype so a `DirvolumeId` can never be handed to a lookup that
//! expects a `SubvolumeId`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a fresh opaque identifier (UUIDv4, hex without dashes)
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Allocate a new random identifier
            pub fn generate() -> Self {
                Self(generate_id())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

entity_id!(
    /// Unique identifier for a cluster (the pool that owns directory volumes)
    ClusterId
);
entity_id!(
    /// Unique identifier for a storage node
    NodeId
);
entity_id!(
    /// Unique identifier for a volume (the parent of sub-volumes)
    VolumeId
);
entity_id!(
    /// Unique identifier for a directory volume
    DirvolumeId
);
entity_id!(
    /// Unique identifier for a sub-volume
    SubvolumeId
);
entity_id!(
    /// Unique identifier for a pending operation record
    PendingOperationId
);

impl PendingOperationId {
    /// Placeholder used before Build persists the record
    pub const NEW_ID: &'static str = "";

    pub fn new_placeholder() -> Self {
        Self(Self::NEW_ID.to_string())
    }

    pub fn is_placeholder(&self) -> bool {
        self.0 == Self::NEW_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique_hex() {
        let a = DirvolumeId::generate();
        let b = DirvolumeId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_pending_placeholder() {
        let id = PendingOperationId::new_placeholder();
        assert!(id.is_placeholder());
        assert!(!PendingOperationId::generate().is_placeholder());
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = SubvolumeId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
