//! Local store capability.
//!
//! The sync engine never owns schema or query logic. It reads and writes
//! entities through the narrow [`LocalStore`] trait and observes commits
//! through the store's change feed. The interactive thread and the background
//! sync context are the only writers, and a single mutual-exclusion boundary
//! around each entity write prevents a local edit and a remote merge from
//! interleaving mid-write.

use crate::entity::SyncedEntity;
use crate::error::CoreResult;
use crate::types::{EntityId, EntityKind};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};

/// Type of store change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEventKind {
    /// Entity was inserted (no previous version existed).
    Insert,
    /// Entity was updated.
    Update,
    /// Entity was tombstoned.
    Delete,
}

/// A single change event from the store's feed.
///
/// Events are emitted only after a write commits, in commit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    /// Store version stamp after this commit.
    pub version: u64,
    /// The entity that changed.
    pub entity_id: EntityId,
    /// Entity kind.
    pub kind: EntityKind,
    /// Type of change.
    pub event: StoreEventKind,
}

/// Capability trait for the durable local entity store.
///
/// Implementations must make `write_entity` atomic for a single entity: an
/// observer never sees a state where `remote_version` was bumped but the
/// merged payload was not applied, or vice versa.
pub trait LocalStore: Send + Sync {
    /// Reads an entity by ID.
    fn read_entity(&self, id: EntityId) -> CoreResult<Option<SyncedEntity>>;

    /// Writes an entity atomically, replacing any previous state.
    fn write_entity(&self, entity: SyncedEntity) -> CoreResult<()>;

    /// Writes an entity only if the stored copy's `local_version` still
    /// equals `expected_local_version` (`None` means the entity must be
    /// absent). Returns whether the write committed.
    ///
    /// The comparison and the write happen inside the same boundary as
    /// [`write_entity`](Self::write_entity), so a merge commit conditioned on
    /// the version it resolved against cannot overwrite an interactive edit
    /// that committed in between; the caller re-reads and re-resolves
    /// instead.
    fn write_entity_if(
        &self,
        entity: SyncedEntity,
        expected_local_version: Option<u64>,
    ) -> CoreResult<bool>;

    /// Enumerates dirty entities, optionally filtered by kind.
    fn enumerate_dirty(&self, kind: Option<EntityKind>) -> CoreResult<Vec<SyncedEntity>>;

    /// Subscribes to the change feed.
    ///
    /// The receiver sees all commits after the subscription, in commit order.
    fn subscribe(&self) -> Receiver<StoreEvent>;

    /// Returns the store version stamp, bumped on every committed write.
    ///
    /// Derived-state caches compare this stamp to decide freshness.
    fn version(&self) -> u64;
}

struct MemoryStoreInner {
    entities: HashMap<EntityId, SyncedEntity>,
    version: u64,
    subscribers: Vec<Sender<StoreEvent>>,
}

impl MemoryStoreInner {
    // Runs under the write lock: map update, version bump, and event
    // emission commit together. The lock is the single mutual-exclusion
    // boundary around "apply a change to an entity".
    fn commit(&mut self, entity: SyncedEntity) {
        let previous = self.entities.insert(entity.id, entity.clone());
        self.version += 1;

        let event = StoreEvent {
            version: self.version,
            entity_id: entity.id,
            kind: entity.kind,
            event: if entity.tombstone {
                StoreEventKind::Delete
            } else if previous.is_some() {
                StoreEventKind::Update
            } else {
                StoreEventKind::Insert
            },
        };
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// In-memory reference implementation of [`LocalStore`].
///
/// Backs the engine's tests and serves as the template for persistent
/// adapters. All operations are synchronous and never touch the network.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                entities: HashMap::new(),
                version: 0,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Returns the number of stored entities, tombstones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().entities.len()
    }

    /// Returns true if the store holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().entities.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore for MemoryStore {
    fn read_entity(&self, id: EntityId) -> CoreResult<Option<SyncedEntity>> {
        Ok(self.inner.read().entities.get(&id).cloned())
    }

    fn write_entity(&self, entity: SyncedEntity) -> CoreResult<()> {
        self.inner.write().commit(entity);
        Ok(())
    }

    fn write_entity_if(
        &self,
        entity: SyncedEntity,
        expected_local_version: Option<u64>,
    ) -> CoreResult<bool> {
        let mut inner = self.inner.write();
        let current = inner.entities.get(&entity.id).map(|e| e.local_version);
        if current != expected_local_version {
            return Ok(false);
        }
        inner.commit(entity);
        Ok(true)
    }

    fn enumerate_dirty(&self, kind: Option<EntityKind>) -> CoreResult<Vec<SyncedEntity>> {
        let inner = self.inner.read();
        let mut dirty: Vec<SyncedEntity> = inner
            .entities
            .values()
            .filter(|e| e.dirty() && kind.is_none_or(|k| e.kind == k))
            .cloned()
            .collect();
        dirty.sort_by_key(|e| e.id);
        Ok(dirty)
    }

    fn subscribe(&self) -> Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel();
        self.inner.write().subscribers.push(tx);
        rx
    }

    fn version(&self) -> u64 {
        self.inner.read().version
    }
}
