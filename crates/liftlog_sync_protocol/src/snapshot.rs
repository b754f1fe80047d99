//! Wire form of a synchronizable entity.

use liftlog_core::{EntityId, EntityKind, SyncedEntity};
use serde::{Deserialize, Serialize};

/// The sync-relevant state of an entity at a point in time.
///
/// Snapshots are what crosses the wire in both directions and what the
/// conflict resolver operates on. The payload stays opaque; `None` marks a
/// tombstoned entity whose content is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity identifier.
    pub id: EntityId,
    /// Entity kind.
    pub kind: EntityKind,
    /// Opaque payload. `None` for tombstones.
    pub payload: Option<Vec<u8>>,
    /// The entity's version counter at snapshot time.
    pub version: u64,
    /// Wall-clock mutation time in milliseconds. Tie-break input only.
    pub updated_at_ms: u64,
    /// Logical deletion marker.
    pub tombstone: bool,
}

impl EntitySnapshot {
    /// Captures a snapshot of a local entity at its current version.
    #[must_use]
    pub fn of_entity(entity: &SyncedEntity) -> Self {
        Self {
            id: entity.id,
            kind: entity.kind,
            payload: if entity.tombstone {
                None
            } else {
                Some(entity.payload.clone())
            },
            version: entity.local_version,
            updated_at_ms: entity.updated_at_ms,
            tombstone: entity.tombstone,
        }
    }

    /// Materializes the snapshot as a clean (fully synced) local entity.
    ///
    /// Both version counters are set to the snapshot version, so the result
    /// is not dirty.
    #[must_use]
    pub fn into_entity(self) -> SyncedEntity {
        SyncedEntity {
            id: self.id,
            kind: self.kind,
            payload: self.payload.unwrap_or_default(),
            local_version: self.version,
            remote_version: self.version,
            updated_at_ms: self.updated_at_ms,
            tombstone: self.tombstone,
        }
    }
}
