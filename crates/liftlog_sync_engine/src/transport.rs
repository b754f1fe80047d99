//! Transport abstraction for the remote store.
//!
//! The remote contract is two calls: push a batch and receive per-entity
//! acks, pull everything past a cursor. Everything else (HTTP, websockets,
//! auth) lives behind implementations of [`RemoteStore`].

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use liftlog_core::EntityId;
use liftlog_sync_protocol::{
    PullRequest, PullResponse, PulledEntity, PushAck, PushRequest, PushResponse,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Abstract remote replica.
///
/// Implementations suspend only inside these calls; the engine confines them
/// to the background sync context and bounds them with the session deadline.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Pushes a batch of collapsed snapshots.
    ///
    /// The response carries one ack per entry; acceptance is per-entity and
    /// atomic.
    async fn push(&self, request: PushRequest) -> SyncResult<PushResponse>;

    /// Pulls entities written after the given cursor.
    async fn pull(&self, request: PullRequest) -> SyncResult<PullResponse>;
}

/// A scriptable transport for tests.
///
/// Queued results are returned in order; once the queues run dry the mock
/// falls back to accept-everything behavior. An optional artificial latency
/// is applied before every reply, which is how deadline and cancellation
/// paths are exercised.
#[derive(Default)]
pub struct MockTransport {
    latency: Mutex<Option<Duration>>,
    push_results: Mutex<VecDeque<SyncResult<PushResponse>>>,
    pull_results: Mutex<VecDeque<SyncResult<PullResponse>>>,
    push_calls: AtomicU64,
    pull_calls: AtomicU64,
    cursor: AtomicU64,
}

impl MockTransport {
    /// Creates a mock with no latency and empty queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an artificial delay before every reply.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Queues a push result.
    pub fn enqueue_push_result(&self, result: SyncResult<PushResponse>) {
        self.push_results.lock().push_back(result);
    }

    /// Queues a pull result.
    pub fn enqueue_pull_result(&self, result: SyncResult<PullResponse>) {
        self.pull_results.lock().push_back(result);
    }

    /// Number of push calls observed.
    #[must_use]
    pub fn push_calls(&self) -> u64 {
        self.push_calls.load(Ordering::SeqCst)
    }

    /// Number of pull calls observed.
    #[must_use]
    pub fn pull_calls(&self) -> u64 {
        self.pull_calls.load(Ordering::SeqCst)
    }

    async fn apply_latency(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RemoteStore for MockTransport {
    async fn push(&self, request: PushRequest) -> SyncResult<PushResponse> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_latency().await;

        if let Some(result) = self.push_results.lock().pop_front() {
            return result;
        }
        // Fallback: accept everything.
        let acks = request
            .entries
            .iter()
            .map(|entry| PushAck::Accepted {
                entity_id: entry.snapshot.id,
                sequence: entry.sequence,
                server_cursor: self.cursor.fetch_add(1, Ordering::SeqCst) + 1,
            })
            .collect();
        Ok(PushResponse { acks })
    }

    async fn pull(&self, _request: PullRequest) -> SyncResult<PullResponse> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_latency().await;

        if let Some(result) = self.pull_results.lock().pop_front() {
            return result;
        }
        Ok(PullResponse {
            entities: Vec::new(),
            new_cursor: self.cursor.load(Ordering::SeqCst),
            has_more: false,
        })
    }
}

struct RemoteEntry {
    snapshot: liftlog_sync_protocol::EntitySnapshot,
    server_cursor: u64,
}

/// In-memory reference remote with real acceptance semantics.
///
/// Accepts a push entry only when its `base_version` matches the stored
/// version for that entity; a mismatch means another device wrote in between
/// and yields a reject carrying the current copy. Every accepted write gets
/// the next value of a global cursor, which is what pulls are ordered by.
#[derive(Default)]
pub struct InMemoryRemote {
    inner: Mutex<RemoteInner>,
}

#[derive(Default)]
struct RemoteInner {
    entities: HashMap<EntityId, RemoteEntry>,
    cursor: u64,
}

impl InMemoryRemote {
    /// Creates an empty remote.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an entity as if another device had pushed it.
    ///
    /// Returns the cursor assigned to the write.
    pub fn seed(&self, snapshot: liftlog_sync_protocol::EntitySnapshot) -> u64 {
        let mut inner = self.inner.lock();
        inner.cursor += 1;
        let cursor = inner.cursor;
        inner
            .entities
            .insert(snapshot.id, RemoteEntry { snapshot, server_cursor: cursor });
        cursor
    }

    /// The remote's current snapshot for an entity.
    #[must_use]
    pub fn current(&self, entity_id: EntityId) -> Option<liftlog_sync_protocol::EntitySnapshot> {
        self.inner
            .lock()
            .entities
            .get(&entity_id)
            .map(|e| e.snapshot.clone())
    }

    /// Number of entities stored remotely.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.inner.lock().entities.len()
    }

    /// The remote's global cursor.
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.inner.lock().cursor
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn push(&self, request: PushRequest) -> SyncResult<PushResponse> {
        let mut inner = self.inner.lock();
        let mut acks = Vec::with_capacity(request.entries.len());

        for entry in request.entries {
            let stored_version = inner
                .entities
                .get(&entry.snapshot.id)
                .map(|e| e.snapshot.version);

            match stored_version {
                Some(version) if version != entry.base_version => {
                    let current = inner
                        .entities
                        .get(&entry.snapshot.id)
                        .map(|e| e.snapshot.clone())
                        .ok_or_else(|| SyncError::Protocol("entity vanished mid-push".into()))?;
                    acks.push(PushAck::Rejected {
                        entity_id: entry.snapshot.id,
                        sequence: entry.sequence,
                        current,
                    });
                }
                _ => {
                    inner.cursor += 1;
                    let cursor = inner.cursor;
                    let entity_id = entry.snapshot.id;
                    inner.entities.insert(
                        entity_id,
                        RemoteEntry {
                            snapshot: entry.snapshot,
                            server_cursor: cursor,
                        },
                    );
                    acks.push(PushAck::Accepted {
                        entity_id,
                        sequence: entry.sequence,
                        server_cursor: cursor,
                    });
                }
            }
        }

        Ok(PushResponse { acks })
    }

    async fn pull(&self, request: PullRequest) -> SyncResult<PullResponse> {
        let inner = self.inner.lock();
        let mut newer: Vec<&RemoteEntry> = inner
            .entities
            .values()
            .filter(|e| e.server_cursor > request.since_cursor)
            .collect();
        newer.sort_by_key(|e| e.server_cursor);

        let has_more = newer.len() > request.limit as usize;
        let page: Vec<PulledEntity> = newer
            .into_iter()
            .take(request.limit as usize)
            .map(|e| PulledEntity {
                snapshot: e.snapshot.clone(),
                server_cursor: e.server_cursor,
            })
            .collect();

        let new_cursor = if has_more {
            page.last().map_or(request.since_cursor, |e| e.server_cursor)
        } else {
            inner.cursor.max(request.since_cursor)
        };

        Ok(PullResponse {
            entities: page,
            new_cursor,
            has_more,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liftlog_core::EntityKind;
    use liftlog_sync_protocol::{EntitySnapshot, PushEntry};

    fn snapshot(byte: u8, version: u64) -> EntitySnapshot {
        EntitySnapshot {
            id: EntityId::from_bytes([byte; 16]),
            kind: EntityKind::SetEntry,
            payload: Some(vec![byte, version as u8]),
            version,
            updated_at_ms: 1_000 + version,
            tombstone: false,
        }
    }

    fn entry(byte: u8, version: u64, base_version: u64, sequence: u64) -> PushEntry {
        PushEntry {
            snapshot: snapshot(byte, version),
            base_version,
            sequence,
        }
    }

    #[tokio::test]
    async fn fresh_entity_is_accepted() {
        let remote = InMemoryRemote::new();
        let response = remote
            .push(PushRequest {
                entries: vec![entry(1, 1, 0, 1)],
            })
            .await
            .unwrap();

        assert!(matches!(response.acks[0], PushAck::Accepted { server_cursor: 1, .. }));
        assert_eq!(remote.entity_count(), 1);
    }

    #[tokio::test]
    async fn stale_base_version_is_rejected_with_current_copy() {
        let remote = InMemoryRemote::new();
        remote.seed(snapshot(1, 4));

        let response = remote
            .push(PushRequest {
                entries: vec![entry(1, 2, 1, 9)],
            })
            .await
            .unwrap();

        match &response.acks[0] {
            PushAck::Rejected { current, sequence, .. } => {
                assert_eq!(current.version, 4);
                assert_eq!(*sequence, 9);
            }
            other => panic!("expected reject, got {other:?}"),
        }
        // A reject never advances the cursor.
        assert_eq!(remote.cursor(), 1);
    }

    #[tokio::test]
    async fn duplicate_batch_replay_leaves_remote_unchanged() {
        let remote = InMemoryRemote::new();
        let batch = PushRequest {
            entries: vec![entry(1, 1, 0, 1)],
        };

        remote.push(batch.clone()).await.unwrap();
        let cursor_after_first = remote.cursor();
        let version_after_first = remote
            .current(EntityId::from_bytes([1u8; 16]))
            .unwrap()
            .version;

        // Duplicate delivery of the identical batch.
        remote.push(batch).await.unwrap();
        assert_eq!(remote.cursor(), cursor_after_first);
        assert_eq!(
            remote
                .current(EntityId::from_bytes([1u8; 16]))
                .unwrap()
                .version,
            version_after_first
        );
    }

    #[tokio::test]
    async fn pull_pages_in_cursor_order() {
        let remote = InMemoryRemote::new();
        for byte in 1..=5u8 {
            remote.seed(snapshot(byte, 1));
        }

        let first = remote
            .pull(PullRequest {
                since_cursor: 0,
                limit: 2,
            })
            .await
            .unwrap();
        assert_eq!(first.entities.len(), 2);
        assert!(first.has_more);
        assert_eq!(first.new_cursor, 2);

        let rest = remote
            .pull(PullRequest {
                since_cursor: first.new_cursor,
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(rest.entities.len(), 3);
        assert!(!rest.has_more);
        assert_eq!(rest.new_cursor, 5);
    }

    #[tokio::test]
    async fn mock_falls_back_to_accepting() {
        let mock = MockTransport::new();
        let response = mock
            .push(PushRequest {
                entries: vec![entry(1, 1, 0, 1), entry(2, 1, 0, 2)],
            })
            .await
            .unwrap();
        assert_eq!(response.acks.len(), 2);
        assert!(response.acks.iter().all(|a| matches!(a, PushAck::Accepted { .. })));
        assert_eq!(mock.push_calls(), 1);
    }

    #[tokio::test]
    async fn mock_returns_queued_errors_first() {
        let mock = MockTransport::new();
        mock.enqueue_push_result(Err(SyncError::transport_retryable("connection reset")));

        let err = mock
            .push(PushRequest { entries: vec![] })
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        // Queue drained; fallback takes over.
        assert!(mock.push(PushRequest { entries: vec![] }).await.is_ok());
    }
}
