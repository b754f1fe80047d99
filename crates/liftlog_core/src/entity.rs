//! Synchronizable entity state.

use crate::types::{EntityId, EntityKind};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time in milliseconds since the Unix epoch.
///
/// Wall-clock time is only ever used as a conflict tie-break, never as a
/// primary ordering.
#[must_use]
pub fn current_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A synchronizable domain object as tracked by the sync engine.
///
/// The payload is opaque to the engine; domain semantics live entirely in the
/// application layer. The engine cares only about identity, version counters,
/// the update timestamp, and the tombstone marker.
///
/// # Version counters
///
/// - `local_version` increases monotonically on every local mutation
/// - `remote_version` is the last version confirmed written to the remote
///   store (0 if never synced)
/// - the entity is dirty exactly when `local_version > remote_version`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncedEntity {
    /// Stable globally unique identifier.
    pub id: EntityId,
    /// Entity kind.
    pub kind: EntityKind,
    /// Opaque serialized payload.
    pub payload: Vec<u8>,
    /// Monotonic counter incremented on every local mutation.
    pub local_version: u64,
    /// Last version confirmed written to the remote store.
    pub remote_version: u64,
    /// Wall-clock timestamp of the last mutation, in milliseconds.
    pub updated_at_ms: u64,
    /// Logical deletion marker, propagated rather than physically erased.
    pub tombstone: bool,
}

impl SyncedEntity {
    /// Creates a new, never-synced entity at version 1.
    #[must_use]
    pub fn new(id: EntityId, kind: EntityKind, payload: Vec<u8>, updated_at_ms: u64) -> Self {
        Self {
            id,
            kind,
            payload,
            local_version: 1,
            remote_version: 0,
            updated_at_ms,
            tombstone: false,
        }
    }

    /// Returns true when local changes have not been confirmed remotely.
    #[must_use]
    pub fn dirty(&self) -> bool {
        self.local_version > self.remote_version
    }

    /// Applies a local mutation: replaces the payload, bumps the local
    /// version, and records the mutation time.
    pub fn apply_local_edit(&mut self, payload: Vec<u8>, updated_at_ms: u64) {
        self.payload = payload;
        self.local_version += 1;
        self.updated_at_ms = updated_at_ms;
    }

    /// Marks the entity logically deleted.
    ///
    /// Deletion is a mutation like any other: it bumps the local version and
    /// is propagated through the outbox.
    pub fn mark_deleted(&mut self, updated_at_ms: u64) {
        self.tombstone = true;
        self.local_version += 1;
        self.updated_at_ms = updated_at_ms;
    }

    /// Records that the given local version was confirmed written remotely.
    ///
    /// Later local edits keep the entity dirty: confirmation never moves
    /// `remote_version` past `local_version`, and never backwards.
    pub fn confirm_pushed(&mut self, version: u64) {
        self.remote_version = self
            .remote_version
            .max(version.min(self.local_version));
    }
}
