//! Persisted scheduler state.
//!
//! A small record that survives process restarts so the scheduler resumes
//! where it left off: the pull cursor, the backoff failure count, and the
//! last known link tier. Losing it is safe (the protocol re-converges from
//! zero), but keeping it avoids re-pulling the world and resetting backoff
//! on every launch.

use crate::error::{SyncError, SyncResult};
use crate::network::LinkTier;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Scheduler state that survives restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerState {
    /// Wall-clock time of the last successful session, if any.
    pub last_successful_sync_at_ms: Option<u64>,
    /// Consecutive failed sessions, feeding backoff restoration.
    pub consecutive_failures: u32,
    /// The link tier last committed by the monitor.
    pub last_known_tier: LinkTier,
    /// The highest remote cursor fully applied locally.
    pub remote_cursor: u64,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self {
            last_successful_sync_at_ms: None,
            consecutive_failures: 0,
            last_known_tier: LinkTier::Offline,
            remote_cursor: 0,
        }
    }
}

/// Capability trait for persisting scheduler state.
pub trait StateStore: Send + Sync {
    /// Loads the persisted state, if any exists.
    fn load(&self) -> SyncResult<Option<SchedulerState>>;

    /// Persists the state, replacing any previous record.
    fn save(&self, state: &SchedulerState) -> SyncResult<()>;
}

/// In-memory state store for tests.
#[derive(Default)]
pub struct MemoryStateStore {
    slot: Mutex<Option<SchedulerState>>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> SyncResult<Option<SchedulerState>> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, state: &SchedulerState) -> SyncResult<()> {
        *self.slot.lock() = Some(state.clone());
        Ok(())
    }
}

/// JSON-file-backed state store.
///
/// Saves write to a sibling temp file and rename into place, so a crash
/// mid-save leaves the previous state readable.
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    /// Creates a store persisting to the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path state is persisted to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> SyncResult<Option<SchedulerState>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(SyncError::StatePersistence(error.to_string())),
        };
        let state = serde_json::from_str(&raw)
            .map_err(|error| SyncError::StatePersistence(error.to_string()))?;
        Ok(Some(state))
    }

    fn save(&self, state: &SchedulerState) -> SyncResult<()> {
        let raw = serde_json::to_string_pretty(state)
            .map_err(|error| SyncError::StatePersistence(error.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, raw).map_err(|error| SyncError::StatePersistence(error.to_string()))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|error| SyncError::StatePersistence(error.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SchedulerState {
        SchedulerState {
            last_successful_sync_at_ms: Some(1_700_000_000_000),
            consecutive_failures: 3,
            last_known_tier: LinkTier::Poor,
            remote_cursor: 42,
        }
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStateStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.save(&state()).unwrap();
        assert_eq!(store.load().unwrap(), Some(state()));
    }

    #[test]
    fn json_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::new(dir.path().join("sync_state.json"));

        assert_eq!(store.load().unwrap(), None);
        store.save(&state()).unwrap();
        assert_eq!(store.load().unwrap(), Some(state()));

        // Overwrite replaces, never appends.
        let mut next = state();
        next.remote_cursor = 99;
        store.save(&next).unwrap();
        assert_eq!(store.load().unwrap().unwrap().remote_cursor, 99);
    }

    #[test]
    fn json_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync_state.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonStateStore::new(path);
        assert!(matches!(
            store.load(),
            Err(SyncError::StatePersistence(_))
        ));
    }

    #[test]
    fn default_state_starts_from_zero() {
        let state = SchedulerState::default();
        assert_eq!(state.remote_cursor, 0);
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.last_known_tier, LinkTier::Offline);
        assert!(state.last_successful_sync_at_ms.is_none());
    }
}
