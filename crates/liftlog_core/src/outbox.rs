//! Change-record outbox: the durable queue of pending local mutations.

use crate::types::{EntityId, EntityKind};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// The operation a change record captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeOp {
    /// Entity was created.
    Create,
    /// Entity was updated.
    Update,
    /// Entity was logically deleted.
    Delete,
}

/// An immutable fact describing one committed local mutation.
///
/// Records are ordered by `sequence`, assigned monotonically at enqueue time.
/// For a given entity, applying its records in sequence order reproduces its
/// current local state. The payload snapshot is the minimal copy needed to
/// replay a push even if the entity has mutated again since.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Monotonic sequence number, assigned by the outbox.
    pub sequence: u64,
    /// The entity this record mutates.
    pub entity_id: EntityId,
    /// Entity kind.
    pub kind: EntityKind,
    /// The captured operation.
    pub operation: ChangeOp,
    /// Payload snapshot at mutation time. `None` for deletes.
    pub payload: Option<Vec<u8>>,
    /// The entity's `local_version` after this mutation.
    pub local_version: u64,
    /// Mutation wall-clock time in milliseconds.
    pub updated_at_ms: u64,
}

/// An outbox entry: a change record plus its acknowledgment state.
#[derive(Debug, Clone, PartialEq)]
struct OutboxEntry {
    record: ChangeRecord,
    acknowledged: bool,
}

/// Durable queue of not-yet-confirmed local mutations.
///
/// The outbox maintains:
/// - Pending records to push, in enqueue order
/// - The next sequence number to assign
/// - The highest acknowledged sequence
///
/// # Invariants
///
/// - Sequence numbers are assigned monotonically and never reused
/// - A record retires only after the remote acknowledges that exact
///   sequence for that entity
/// - Acknowledgment is idempotent: re-acknowledging a sequence is a no-op
pub struct Outbox {
    entries: VecDeque<OutboxEntry>,
    next_sequence: u64,
    last_acked: u64,
}

impl Outbox {
    /// Creates a new empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            next_sequence: 1,
            last_acked: 0,
        }
    }

    /// Restores an outbox from persisted counters.
    #[must_use]
    pub fn from_state(next_sequence: u64, last_acked: u64) -> Self {
        Self {
            entries: VecDeque::new(),
            next_sequence,
            last_acked,
        }
    }

    /// Appends a record, assigning its sequence number.
    ///
    /// Returns the assigned sequence.
    pub fn append(&mut self, mut record: ChangeRecord) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        record.sequence = sequence;
        self.entries.push_back(OutboxEntry {
            record,
            acknowledged: false,
        });
        sequence
    }

    /// Returns pending (unacknowledged) records in sequence order.
    pub fn pending(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.entries
            .iter()
            .filter(|e| !e.acknowledged)
            .map(|e| &e.record)
    }

    /// Returns the number of pending records.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.acknowledged).count()
    }

    /// Returns pending records for one entity, in sequence order.
    #[must_use]
    pub fn pending_for(&self, entity_id: EntityId) -> Vec<&ChangeRecord> {
        self.pending()
            .filter(|r| r.entity_id == entity_id)
            .collect()
    }

    /// Returns true when the entity has at least one pending record.
    #[must_use]
    pub fn has_pending_for(&self, entity_id: EntityId) -> bool {
        self.pending().any(|r| r.entity_id == entity_id)
    }

    /// Returns the highest pending sequence for an entity, if any.
    #[must_use]
    pub fn last_pending_sequence(&self, entity_id: EntityId) -> Option<u64> {
        self.pending()
            .filter(|r| r.entity_id == entity_id)
            .map(|r| r.sequence)
            .max()
    }

    /// Collapses pending records to the latest snapshot per entity.
    ///
    /// An entity updated five times while offline is pushed once, not five
    /// times. The returned batch is ordered by each entity's earliest pending
    /// sequence, so cross-entity push order follows first-edit order. The
    /// original records stay in the outbox until push and acknowledgment
    /// succeed, preserving replay correctness if the push is interrupted.
    #[must_use]
    pub fn collapse(&self) -> Vec<ChangeRecord> {
        let mut latest: Vec<(u64, ChangeRecord)> = Vec::new();
        for record in self.pending() {
            match latest.iter_mut().find(|(_, r)| r.entity_id == record.entity_id) {
                Some((_, slot)) => *slot = record.clone(),
                None => latest.push((record.sequence, record.clone())),
            }
        }
        latest.sort_by_key(|(first_seq, _)| *first_seq);
        latest.into_iter().map(|(_, r)| r).collect()
    }

    /// Acknowledges an entity's records up to the given sequence.
    ///
    /// Only records for that exact entity retire; acknowledgment is
    /// per-entity and atomic.
    pub fn acknowledge(&mut self, entity_id: EntityId, up_to_sequence: u64) {
        for entry in &mut self.entries {
            if entry.record.entity_id == entity_id && entry.record.sequence <= up_to_sequence {
                entry.acknowledged = true;
            }
        }
        self.last_acked = self.last_acked.max(up_to_sequence);
        self.compact();
    }

    /// Drops an entity's pending records at or below the given sequence.
    ///
    /// Used when a remote merge wins wholesale: the snapshots the resolution
    /// consumed no longer represent entity state and must not be replayed.
    /// Records enqueued after the merge read its inputs stay pending.
    pub fn clear_entity_up_to(&mut self, entity_id: EntityId, up_to_sequence: u64) {
        self.entries
            .retain(|e| e.record.entity_id != entity_id || e.record.sequence > up_to_sequence);
    }

    /// Removes acknowledged entries from the front of the queue.
    pub fn compact(&mut self) {
        while let Some(entry) = self.entries.front() {
            if entry.acknowledged {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Returns the highest acknowledged sequence.
    #[must_use]
    pub fn last_acked(&self) -> u64 {
        self.last_acked
    }

    /// Returns the next sequence number to be assigned.
    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Returns the total number of entries, acknowledged or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the outbox holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new()
    }
}
