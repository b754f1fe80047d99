//! Derived-state cache for computed aggregates.
//!
//! Aggregates (streaks, personal-record tables) are invalidated when a merge
//! touches one of their dependency kinds and recomputed lazily on the next
//! read. Recompute is never eager, so a burst of pulled records cannot cause
//! a recompute storm.

use crate::error::{CoreError, CoreResult};
use crate::types::EntityKind;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// The aggregate a cache slot derives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivationKind {
    /// Consecutive-training-day streak count.
    StreakCount,
    /// Table of personal records per exercise.
    PersonalRecordTable,
    /// Total training volume for the current week.
    WeeklyVolume,
}

struct Slot<V> {
    deps: HashSet<EntityKind>,
    cached: Option<(u64, V)>,
    stale: bool,
}

/// Cache of derived aggregates keyed by derivation kind.
///
/// # Invariant
///
/// A stale value is never served as fresh: every read checks the slot's
/// version stamp against the current store version before returning a cached
/// value, and recomputes when they differ.
pub struct DerivedCache<V> {
    slots: RwLock<HashMap<DerivationKind, Slot<V>>>,
}

impl<V: Clone> DerivedCache<V> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a derivation with its entity-kind dependency set.
    pub fn register(&self, kind: DerivationKind, deps: impl IntoIterator<Item = EntityKind>) {
        self.slots.write().insert(
            kind,
            Slot {
                deps: deps.into_iter().collect(),
                cached: None,
                stale: true,
            },
        );
    }

    /// Marks every derivation depending on one of the touched kinds stale.
    ///
    /// Returns the number of slots invalidated. Values are not recomputed
    /// here; that happens lazily on the next read.
    pub fn invalidate_for(&self, touched: &[EntityKind]) -> usize {
        let mut slots = self.slots.write();
        let mut invalidated = 0;
        for slot in slots.values_mut() {
            if touched.iter().any(|k| slot.deps.contains(k)) && !slot.stale {
                slot.stale = true;
                invalidated += 1;
            }
        }
        invalidated
    }

    /// Returns true when the derivation is stale or has never been computed.
    #[must_use]
    pub fn is_stale(&self, kind: DerivationKind) -> bool {
        self.slots
            .read()
            .get(&kind)
            .is_none_or(|s| s.stale || s.cached.is_none())
    }

    /// Reads the cached aggregate, recomputing it if stale or out of date.
    ///
    /// `store_version` is the current entity-store version stamp; a cached
    /// value computed under an older stamp is treated as stale even if no
    /// explicit invalidation arrived.
    pub fn read_or_compute<F>(
        &self,
        kind: DerivationKind,
        store_version: u64,
        compute: F,
    ) -> CoreResult<V>
    where
        F: FnOnce() -> CoreResult<V>,
    {
        {
            let slots = self.slots.read();
            let slot = slots.get(&kind).ok_or(CoreError::InvalidOperation {
                message: format!("derivation {kind:?} is not registered"),
            })?;
            if !slot.stale {
                if let Some((stamp, value)) = &slot.cached {
                    if *stamp == store_version {
                        return Ok(value.clone());
                    }
                }
            }
        }

        let value = compute()?;
        let mut slots = self.slots.write();
        if let Some(slot) = slots.get_mut(&kind) {
            slot.cached = Some((store_version, value.clone()));
            slot.stale = false;
        }
        Ok(value)
    }
}

impl<V: Clone> Default for DerivedCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
