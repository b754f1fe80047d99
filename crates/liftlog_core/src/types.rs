//! Identity types for synchronizable entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a synchronizable entity.
///
/// Entity IDs are 128-bit UUIDs that are:
/// - Globally unique within a user's dataset
/// - Immutable once assigned
/// - Never reused
///
/// The `Ord` implementation compares raw bytes. Conflict resolution relies on
/// this ordering as a deterministic tie-break, so it must be identical on
/// every device.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId([u8; 16]);

impl EntityId {
    /// Creates an entity ID from raw bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Creates a new random entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Converts to a UUID.
    #[must_use]
    pub fn to_uuid(&self) -> Uuid {
        Uuid::from_bytes(self.0)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.to_uuid())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uuid())
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.into_bytes())
    }
}

/// Kind of synchronizable entity.
///
/// The sync engine treats entity payloads as opaque bytes; the kind exists
/// for dirty enumeration and derived-cache dependency tracking only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// A logged day of training.
    WorkoutDay,
    /// An exercise definition.
    Exercise,
    /// A single logged set.
    SetEntry,
    /// A training split.
    Split,
    /// A progress photo reference.
    ProgressPhoto,
    /// A personal record.
    PersonalRecord,
}

impl EntityKind {
    /// All entity kinds, in a stable order.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::WorkoutDay,
        EntityKind::Exercise,
        EntityKind::SetEntry,
        EntityKind::Split,
        EntityKind::ProgressPhoto,
        EntityKind::PersonalRecord,
    ];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::WorkoutDay => "workout_day",
            EntityKind::Exercise => "exercise",
            EntityKind::SetEntry => "set_entry",
            EntityKind::Split => "split",
            EntityKind::ProgressPhoto => "progress_photo",
            EntityKind::PersonalRecord => "personal_record",
        };
        f.write_str(name)
    }
}
