//! Push/pull protocol messages.

use crate::snapshot::EntitySnapshot;
use liftlog_core::EntityId;
use serde::{Deserialize, Serialize};

/// One entity in a push batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEntry {
    /// The collapsed snapshot to write remotely.
    pub snapshot: EntitySnapshot,
    /// The sender's last confirmed version for this entity.
    ///
    /// The remote accepts the write only when this matches its stored
    /// version; a mismatch means another device wrote in between.
    pub base_version: u64,
    /// The outbox sequence that produced this snapshot. Echoed in the ack so
    /// the sender can retire exactly the records it pushed.
    pub sequence: u64,
}

/// Push request: collapsed snapshots for dirty entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Entries to write, at most one per entity.
    pub entries: Vec<PushEntry>,
}

/// Per-entity acknowledgment for a push entry.
///
/// Acknowledgment is atomic per entity: an entry is either fully accepted or
/// fully rejected, never half-applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushAck {
    /// The remote stored the snapshot.
    Accepted {
        /// The acknowledged entity.
        entity_id: EntityId,
        /// The outbox sequence being acknowledged.
        sequence: u64,
        /// The remote's global cursor value assigned to this write.
        server_cursor: u64,
    },
    /// The remote refused the write because another device got there first.
    ///
    /// Carries the remote's current copy so the sender can resolve the
    /// conflict immediately, without a second round trip.
    Rejected {
        /// The rejected entity.
        entity_id: EntityId,
        /// The outbox sequence that was rejected.
        sequence: u64,
        /// The remote's current snapshot for this entity.
        current: EntitySnapshot,
    },
}

impl PushAck {
    /// The entity this ack refers to.
    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        match self {
            PushAck::Accepted { entity_id, .. } | PushAck::Rejected { entity_id, .. } => *entity_id,
        }
    }
}

/// Push response: one ack per pushed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    /// Acks in the same order as the request entries.
    pub acks: Vec<PushAck>,
}

/// Pull request: everything past the client's cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// The highest remote cursor the client has already applied.
    pub since_cursor: u64,
    /// Maximum number of entities to return.
    pub limit: u32,
}

/// An entity returned by a pull, tagged with its remote cursor position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulledEntity {
    /// The remote's current snapshot.
    pub snapshot: EntitySnapshot,
    /// The remote cursor value of the write that produced this snapshot.
    pub server_cursor: u64,
}

/// Pull response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullResponse {
    /// Entities written after `since_cursor`, in cursor order.
    pub entities: Vec<PulledEntity>,
    /// The cursor to resume from next time.
    pub new_cursor: u64,
    /// Whether more entities remain past this batch.
    pub has_more: bool,
}
