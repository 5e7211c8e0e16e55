//! Strongly-typed identifier types for the PeerRank domain.
//!
//! Each major entity gets its own UUID newtype so ids cannot be mixed up at
//! compile time. All ids use UUID v7 for time-ordering and distributed
//! generation.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new ID with a time-ordered UUID v7
            #[inline]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Create an ID from an existing UUID
            #[inline]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get a reference to the underlying UUID
            #[inline]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Convert to the underlying UUID
            #[inline]
            pub fn into_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

define_id!(EventId, "Unique identifier for events (UUID v7 for time-ordering)");

define_id!(ParticipantId, "Unique identifier for participants");

define_id!(ProposalId, "Unique identifier for proposals");

define_id!(AssignmentId, "Unique identifier for evaluation assignments");

define_id!(BallotId, "Unique identifier for single ballot entries");

define_id!(ConfigId, "Unique identifier for voting configurations");

define_id!(ResultsId, "Unique identifier for computed voting results");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_creation() {
        let id = EventId::new();
        assert_ne!(id.to_string(), "");
    }

    #[test]
    fn test_id_equality() {
        let uuid = Uuid::now_v7();
        let id1 = EventId::from_uuid(uuid);
        let id2 = EventId::from_uuid(uuid);
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_id_from_string() {
        let id1 = ProposalId::new();
        let s = id1.to_string();
        let id2: ProposalId = s.parse().unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_id_serialization() {
        let id = ParticipantId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: ParticipantId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_id_ordering_is_stable() {
        let uuid_a = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();
        let uuid_b = Uuid::parse_str("00000000-0000-0000-0000-000000000002").unwrap();
        assert!(ProposalId::from_uuid(uuid_a) < ProposalId::from_uuid(uuid_b));
    }
}
