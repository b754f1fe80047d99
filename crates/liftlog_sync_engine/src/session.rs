//! A single bounded sync session: push, then pull.
//!
//! One session is one deadline-bounded exchange with the remote. Push goes
//! first so the remote can reject stale writes and hand back its current copy
//! in the same round trip. All local state transitions (ack processing, merge
//! commits, outbox retirement) happen synchronously between awaits, so a
//! timeout or cancellation can only land at a transport boundary and never
//! observes a half-applied merge.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::resolver;
use crate::transport::RemoteStore;
use liftlog_core::{
    current_time_ms, ChangeOp, ChangeRecord, EntityId, EntityKind, LocalStore, Outbox, SyncedEntity,
};
use liftlog_sync_protocol::{
    ConflictReport, EntitySnapshot, PullRequest, PushAck, PushEntry, PushRequest, PushResponse,
    SessionOutcome, SessionResult,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::watch;

/// What one session changed, beyond the protocol-level result.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Protocol-level outcome and counters.
    pub result: SessionResult,
    /// The remote cursor to persist and resume from.
    ///
    /// Reflects only fully applied pull batches; an interrupted batch does
    /// not advance it.
    pub new_cursor: u64,
    /// Kinds of entities whose local state changed, for cache invalidation.
    pub touched_kinds: Vec<EntityKind>,
    /// Entities skipped because their payload or records were unusable.
    pub quarantined: Vec<EntityId>,
}

#[derive(Default)]
struct Progress {
    pushed: u64,
    pulled: u64,
    conflicts: Vec<ConflictReport>,
    touched: Vec<EntityKind>,
    quarantined: Vec<EntityId>,
    cursor: u64,
    // sequence -> (entity, pushed version), for ack processing
    in_flight: HashMap<u64, (EntityId, u64)>,
    // entity -> server cursor of our own accepted write this session, so the
    // trailing pull does not re-apply our own echo
    self_acked: HashMap<EntityId, u64>,
}

/// One push-then-pull exchange against a remote.
pub struct SyncSession<'a, R: RemoteStore + ?Sized> {
    config: &'a SyncConfig,
    store: &'a dyn LocalStore,
    outbox: &'a Mutex<Outbox>,
    remote: &'a R,
}

impl<'a, R: RemoteStore + ?Sized> SyncSession<'a, R> {
    /// Creates a session over the given store, outbox, and transport.
    pub fn new(
        config: &'a SyncConfig,
        store: &'a dyn LocalStore,
        outbox: &'a Mutex<Outbox>,
        remote: &'a R,
    ) -> Self {
        Self {
            config,
            store,
            outbox,
            remote,
        }
    }

    /// Runs the session to completion, deadline, or cancellation.
    ///
    /// `since_cursor` is the highest remote cursor already applied locally.
    /// The cancel channel is observed cooperatively at transport boundaries;
    /// flipping it mid-commit cannot tear a merge.
    pub async fn run(
        &self,
        since_cursor: u64,
        mut cancel: watch::Receiver<bool>,
    ) -> SessionReport {
        let started_at_ms = current_time_ms();
        let deadline = self.config.session_deadline;

        let mut progress = Progress {
            cursor: since_cursor,
            ..Progress::default()
        };

        let outcome = {
            let exchange = self.exchange(&mut progress);
            tokio::pin!(exchange);
            let timed = tokio::time::timeout(deadline, async {
                tokio::select! {
                    result = &mut exchange => result,
                    () = cancelled(&mut cancel) => Err(SyncError::Cancelled),
                }
            })
            .await;

            match timed {
                Ok(Ok(())) => SessionOutcome::Success,
                Ok(Err(SyncError::Cancelled)) => {
                    tracing::info!("sync session cancelled");
                    SessionOutcome::Cancelled
                }
                Ok(Err(error)) => {
                    tracing::warn!(%error, "sync session failed");
                    SessionOutcome::TransportError
                }
                Err(_elapsed) => {
                    tracing::warn!(?deadline, "sync session deadline elapsed");
                    SessionOutcome::Timeout
                }
            }
        };

        SessionReport {
            result: SessionResult {
                started_at_ms,
                deadline,
                outcome,
                pushed: progress.pushed,
                pulled: progress.pulled,
                conflicts: std::mem::take(&mut progress.conflicts),
            },
            new_cursor: progress.cursor,
            touched_kinds: std::mem::take(&mut progress.touched),
            quarantined: std::mem::take(&mut progress.quarantined),
        }
    }

    async fn exchange(&self, progress: &mut Progress) -> SyncResult<()> {
        self.check_integrity()?;

        let entries = self.assemble_push(progress)?;
        for chunk in entries.chunks(self.config.push_batch_size.max(1)) {
            let response = self
                .remote
                .push(PushRequest {
                    entries: chunk.to_vec(),
                })
                .await?;
            self.apply_push_acks(&response, progress)?;
        }

        loop {
            let response = self
                .remote
                .pull(PullRequest {
                    since_cursor: progress.cursor,
                    limit: self.config.pull_batch_size.max(1),
                })
                .await?;
            let has_more = response.has_more;
            let new_cursor = response.new_cursor;
            self.apply_pulled(response.entities, progress)?;
            progress.cursor = progress.cursor.max(new_cursor);
            if !has_more {
                break;
            }
        }

        Ok(())
    }

    /// Every dirty entity must have a pending outbox record; a dirty entity
    /// without one can never sync and would go stale forever.
    fn check_integrity(&self) -> SyncResult<()> {
        let dirty = self.store.enumerate_dirty(None)?;
        let outbox = self.outbox.lock();
        for entity in &dirty {
            if !outbox.has_pending_for(entity.id) {
                return Err(SyncError::CorruptState {
                    entity_id: entity.id,
                    reason: "dirty entity has no pending outbox record".into(),
                });
            }
        }
        Ok(())
    }

    fn assemble_push(&self, progress: &mut Progress) -> SyncResult<Vec<PushEntry>> {
        let batch = self.outbox.lock().collapse();
        let mut entries = Vec::with_capacity(batch.len());

        for record in batch {
            let Some(entity) = self.store.read_entity(record.entity_id)? else {
                tracing::warn!(
                    entity = %record.entity_id,
                    "outbox record for a missing entity, quarantined"
                );
                progress.quarantined.push(record.entity_id);
                continue;
            };
            let snapshot = match snapshot_of_record(&record, &entity) {
                Ok(snapshot) => snapshot,
                Err(reason) => {
                    tracing::warn!(entity = %record.entity_id, reason, "unusable record, quarantined");
                    progress.quarantined.push(record.entity_id);
                    continue;
                }
            };

            progress
                .in_flight
                .insert(record.sequence, (record.entity_id, snapshot.version));
            entries.push(PushEntry {
                snapshot,
                base_version: entity.remote_version,
                sequence: record.sequence,
            });
        }

        Ok(entries)
    }

    fn apply_push_acks(&self, response: &PushResponse, progress: &mut Progress) -> SyncResult<()> {
        for ack in &response.acks {
            match ack {
                PushAck::Accepted {
                    entity_id,
                    sequence,
                    server_cursor,
                } => {
                    let Some((_, pushed_version)) = progress.in_flight.remove(sequence) else {
                        return Err(SyncError::Protocol(format!(
                            "ack for unknown sequence {sequence}"
                        )));
                    };
                    self.outbox.lock().acknowledge(*entity_id, *sequence);
                    // Confirm against whatever copy is current; an edit
                    // racing the ack just leaves the entity dirty for the
                    // next session.
                    loop {
                        let Some(entity) = self.store.read_entity(*entity_id)? else {
                            break;
                        };
                        let expected = entity.local_version;
                        let mut confirmed = entity;
                        confirmed.confirm_pushed(pushed_version);
                        if self.store.write_entity_if(confirmed, Some(expected))? {
                            break;
                        }
                    }
                    progress.self_acked.insert(*entity_id, *server_cursor);
                    progress.pushed += 1;
                }
                PushAck::Rejected {
                    sequence, current, ..
                } => {
                    progress.in_flight.remove(sequence);
                    if let Some(report) = self.merge_with_remote(current, progress)? {
                        progress.conflicts.push(report);
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_pulled(
        &self,
        entities: Vec<liftlog_sync_protocol::PulledEntity>,
        progress: &mut Progress,
    ) -> SyncResult<()> {
        for pulled in entities {
            let snapshot = pulled.snapshot;

            // Skip the echo of our own write from earlier in this session.
            if progress.self_acked.get(&snapshot.id) == Some(&pulled.server_cursor) {
                continue;
            }
            if !snapshot.tombstone && snapshot.payload.is_none() {
                tracing::warn!(entity = %snapshot.id, "pulled snapshot without payload, quarantined");
                progress.quarantined.push(snapshot.id);
                continue;
            }

            match self.store.read_entity(snapshot.id)? {
                None => {
                    let kind = snapshot.kind;
                    self.store.write_entity(snapshot.into_entity())?;
                    touch(&mut progress.touched, kind);
                    progress.pulled += 1;
                }
                Some(entity) if entity.dirty() => {
                    if let Some(report) = self.merge_with_remote(&snapshot, progress)? {
                        progress.conflicts.push(report);
                    }
                    progress.pulled += 1;
                }
                Some(entity) => {
                    // Clean local copy: apply unless the pull is stale.
                    if snapshot.version > entity.remote_version {
                        let kind = snapshot.kind;
                        self.store.write_entity(snapshot.into_entity())?;
                        touch(&mut progress.touched, kind);
                        progress.pulled += 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolves the local copy against a remote snapshot and commits the
    /// result.
    ///
    /// The commit is conditional on the `local_version` the resolution read;
    /// an interactive edit landing in between makes the conditional write
    /// miss, and the merge re-resolves against the new copy instead of
    /// overwriting it. Remote win: the entity becomes a clean copy of the
    /// merged snapshot and the records the resolution consumed retire, while
    /// records enqueued since stay pending. Local win: the entity keeps its
    /// content but takes the remote's version as its new push base, with
    /// `local_version` bumped past it so it stays dirty and re-pushes next
    /// session.
    fn merge_with_remote(
        &self,
        remote: &EntitySnapshot,
        progress: &mut Progress,
    ) -> SyncResult<Option<ConflictReport>> {
        loop {
            let Some(entity) = self.store.read_entity(remote.id)? else {
                // Deleted locally since the push; nothing to merge.
                return Ok(None);
            };
            let expected = entity.local_version;
            let consumed = self.outbox.lock().last_pending_sequence(remote.id);
            let local = EntitySnapshot::of_entity(&entity);
            let (merged, report) = resolver::resolve(&local, remote);

            let committed = if report.remote_won {
                let kind = merged.kind;
                if self.store.write_entity_if(merged.into_entity(), Some(expected))? {
                    if let Some(sequence) = consumed {
                        self.outbox.lock().clear_entity_up_to(remote.id, sequence);
                    }
                    touch(&mut progress.touched, kind);
                    true
                } else {
                    false
                }
            } else {
                let entity = SyncedEntity {
                    id: merged.id,
                    kind: merged.kind,
                    payload: merged.payload.clone().unwrap_or_default(),
                    local_version: merged.version.max(remote.version + 1),
                    remote_version: remote.version,
                    updated_at_ms: merged.updated_at_ms,
                    tombstone: merged.tombstone,
                };
                self.store.write_entity_if(entity, Some(expected))?
            };

            if committed {
                return Ok(Some(report));
            }
            tracing::debug!(entity = %remote.id, "merge raced a local edit, re-resolving");
        }
    }
}

/// Builds the wire snapshot for a collapsed record.
///
/// The record carries the content; the live entity carries the current
/// version counter, which may have moved past the record's after a local-win
/// merge.
fn snapshot_of_record(
    record: &ChangeRecord,
    entity: &SyncedEntity,
) -> Result<EntitySnapshot, &'static str> {
    let tombstone = record.operation == ChangeOp::Delete;
    let payload = match (&record.payload, tombstone) {
        (Some(payload), false) => Some(payload.clone()),
        (None, true) => None,
        (None, false) => return Err("non-delete record without payload"),
        (Some(_), true) => None,
    };
    Ok(EntitySnapshot {
        id: record.entity_id,
        kind: record.kind,
        payload,
        version: record.local_version.max(entity.local_version),
        updated_at_ms: record.updated_at_ms.max(entity.updated_at_ms),
        tombstone,
    })
}

fn touch(touched: &mut Vec<EntityKind>, kind: EntityKind) {
    if !touched.contains(&kind) {
        touched.push(kind);
    }
}

/// Resolves once the cancel flag flips to true; pends forever otherwise.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender gone: cancellation can no longer be requested.
            std::future::pending::<()>().await;
        }
    }
}
