//! Background sync scheduler.
//!
//! Owns the decision of *when* to run a session; the session owns *what* an
//! exchange does. The scheduler is a single background task driven entirely
//! by signals (enqueued work, foreground transitions, tier changes,
//! suppression) and timers (debounce, cooldown, backoff). Sync is never
//! user-facing: there is no "sync now" input and no blocking UI state, only
//! the passive status this module exposes.

use crate::backoff::BackoffController;
use crate::config::SyncConfig;
use crate::network::LinkTier;
use crate::session::SyncSession;
use crate::state::{SchedulerState, StateStore};
use crate::transport::RemoteStore;
use liftlog_core::{current_time_ms, EntityKind, LocalStore, Outbox};
use liftlog_sync_protocol::SessionResult;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Where the scheduler is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Nothing to do; waiting for work or a foreground transition.
    Idle,
    /// Work is queued, but a gate (tier, suppression, debounce, backoff) is
    /// closed.
    AwaitingWindow,
    /// A session is in flight.
    Running,
    /// A session just finished; holding for the debounce interval.
    Cooldown,
}

/// Events published by the scheduler.
///
/// The UI layer renders passive status from these; the derived-state cache
/// invalidates from `MergeCommitted`.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// The scheduler moved to a new phase.
    PhaseChanged(SchedulerPhase),
    /// A session finished, successfully or not.
    SessionCompleted(SessionResult),
    /// A session changed local entities of these kinds.
    MergeCommitted {
        /// Kinds whose local state changed.
        kinds: Vec<EntityKind>,
    },
}

/// Passive sync status, the only sync surface the UI gets.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    /// Current phase.
    pub phase: SchedulerPhase,
    /// Wall-clock time of the last successful session, if any.
    pub last_successful_sync_at_ms: Option<u64>,
    /// Change records not yet confirmed by the remote.
    pub pending_records: usize,
    /// Last committed link tier.
    pub tier: LinkTier,
}

/// The background sync scheduler.
///
/// Construct one per remote link, then [`spawn`](Self::spawn) it; all further
/// interaction goes through the returned [`SchedulerHandle`].
pub struct SyncScheduler<R: RemoteStore> {
    config: SyncConfig,
    store: Arc<dyn LocalStore>,
    outbox: Arc<Mutex<Outbox>>,
    remote: Arc<R>,
    tier_rx: watch::Receiver<LinkTier>,
    state_store: Arc<dyn StateStore>,
}

impl<R: RemoteStore + 'static> SyncScheduler<R> {
    /// Creates a scheduler over the given store, outbox, transport, tier
    /// feed, and state store.
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn LocalStore>,
        outbox: Arc<Mutex<Outbox>>,
        remote: Arc<R>,
        tier_rx: watch::Receiver<LinkTier>,
        state_store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            config,
            store,
            outbox,
            remote,
            tier_rx,
            state_store,
        }
    }

    /// Spawns the scheduler task and returns its handle.
    #[must_use]
    pub fn spawn(self) -> SchedulerHandle {
        let wake = Arc::new(Notify::new());
        let (suppress_tx, suppress_rx) = watch::channel(false);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events_tx, _) = broadcast::channel(64);
        let status = Arc::new(RwLock::new(SyncStatus {
            phase: SchedulerPhase::Idle,
            last_successful_sync_at_ms: None,
            pending_records: 0,
            tier: *self.tier_rx.borrow(),
        }));

        let ctx = LoopCtx {
            config: self.config,
            store: self.store,
            outbox: self.outbox,
            remote: self.remote,
            tier_rx: self.tier_rx,
            suppress_rx,
            shutdown_rx,
            wake: Arc::clone(&wake),
            events: events_tx.clone(),
            status: Arc::clone(&status),
            state_store: self.state_store,
        };
        let task = tokio::spawn(run_loop(ctx));

        SchedulerHandle {
            wake,
            suppress_tx,
            shutdown_tx,
            events: events_tx,
            status,
            task,
        }
    }
}

/// Handle to a spawned scheduler.
pub struct SchedulerHandle {
    wake: Arc<Notify>,
    suppress_tx: watch::Sender<bool>,
    shutdown_tx: watch::Sender<bool>,
    events: broadcast::Sender<SchedulerEvent>,
    status: Arc<RwLock<SyncStatus>>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signals that a change record was enqueued.
    ///
    /// Cheap and coalescing: a burst of edits wakes the scheduler once.
    pub fn notify_change_enqueued(&self) {
        self.wake.notify_one();
    }

    /// Signals that the app moved to the foreground.
    ///
    /// Triggers an opportunistic session even with an empty outbox, to pull
    /// what other devices wrote in the meantime.
    pub fn app_foregrounded(&self) {
        self.wake.notify_one();
    }

    /// Sets whether an interactive workout is in progress.
    ///
    /// While active, no new session starts and an in-flight one is cancelled
    /// at its next transport boundary.
    pub fn set_workout_active(&self, active: bool) {
        let _ = self.suppress_tx.send(active);
        if !active {
            // Deferred work becomes eligible again.
            self.wake.notify_one();
        }
    }

    /// Subscribes to scheduler events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    /// Current passive status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.status.read().clone()
    }

    /// Requests shutdown and waits for the task to finish.
    ///
    /// An in-flight session is cancelled at its next transport boundary and
    /// state is persisted before the task exits.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

struct LoopCtx<R: RemoteStore> {
    config: SyncConfig,
    store: Arc<dyn LocalStore>,
    outbox: Arc<Mutex<Outbox>>,
    remote: Arc<R>,
    tier_rx: watch::Receiver<LinkTier>,
    suppress_rx: watch::Receiver<bool>,
    shutdown_rx: watch::Receiver<bool>,
    wake: Arc<Notify>,
    events: broadcast::Sender<SchedulerEvent>,
    status: Arc<RwLock<SyncStatus>>,
    state_store: Arc<dyn StateStore>,
}

impl<R: RemoteStore> LoopCtx<R> {
    fn set_phase(&self, phase: &mut SchedulerPhase, next: SchedulerPhase) {
        if *phase != next {
            *phase = next;
            let _ = self.events.send(SchedulerEvent::PhaseChanged(next));
        }
        self.refresh_status(*phase, None);
    }

    fn refresh_status(&self, phase: SchedulerPhase, last_success: Option<u64>) {
        let mut status = self.status.write();
        status.phase = phase;
        status.pending_records = self.outbox.lock().pending_count();
        status.tier = *self.tier_rx.borrow();
        if last_success.is_some() {
            status.last_successful_sync_at_ms = last_success;
        }
    }
}

async fn run_loop<R: RemoteStore>(mut ctx: LoopCtx<R>) {
    let mut state = match ctx.state_store.load() {
        Ok(Some(state)) => state,
        Ok(None) => SchedulerState::default(),
        Err(error) => {
            tracing::warn!(%error, "failed to load scheduler state, starting fresh");
            SchedulerState::default()
        }
    };
    let mut backoff = BackoffController::from_failures(
        ctx.config.backoff.clone(),
        state.consecutive_failures,
        Instant::now(),
    );
    let mut cursor = state.remote_cursor;
    let mut phase = SchedulerPhase::Idle;
    let mut last_session_end: Option<Instant> = None;
    ctx.refresh_status(phase, state.last_successful_sync_at_ms);

    loop {
        if *ctx.shutdown_rx.borrow() {
            break;
        }

        match phase {
            SchedulerPhase::Idle => {
                tokio::select! {
                    () = ctx.wake.notified() => {
                        ctx.set_phase(&mut phase, SchedulerPhase::AwaitingWindow);
                    }
                    () = changed_or_pending(&mut ctx.tier_rx) => {
                        // A link recovering to Good opens a window even with
                        // an empty outbox, to pull what other devices wrote
                        // in the meantime.
                        if *ctx.tier_rx.borrow() == LinkTier::Good {
                            ctx.set_phase(&mut phase, SchedulerPhase::AwaitingWindow);
                        } else {
                            ctx.refresh_status(phase, None);
                        }
                    }
                    () = shutdown_signal(&mut ctx.shutdown_rx) => break,
                }
            }

            SchedulerPhase::AwaitingWindow => {
                let now = Instant::now();
                let tier_ok = *ctx.tier_rx.borrow() == LinkTier::Good;
                let suppressed = *ctx.suppress_rx.borrow();
                let debounce_ready = last_session_end.map(|t| t + ctx.config.debounce_interval);
                let debounce_ok = debounce_ready.is_none_or(|t| now >= t);
                let backoff_ok = backoff.can_attempt(now);

                if tier_ok && !suppressed && debounce_ok && backoff_ok {
                    ctx.set_phase(&mut phase, SchedulerPhase::Running);
                    continue;
                }

                // The later of the blocked timers; gate signals re-evaluate
                // everything anyway.
                let timer = [
                    debounce_ready.filter(|_| !debounce_ok),
                    backoff.next_eligible().filter(|_| !backoff_ok),
                ]
                .into_iter()
                .flatten()
                .max();

                tokio::select! {
                    () = ctx.wake.notified() => {}
                    () = changed_or_pending(&mut ctx.tier_rx) => {}
                    () = changed_or_pending(&mut ctx.suppress_rx) => {}
                    () = sleep_until_opt(timer) => {}
                    () = shutdown_signal(&mut ctx.shutdown_rx) => break,
                }
                ctx.refresh_status(phase, None);
            }

            SchedulerPhase::Running => {
                let (cancel_tx, cancel_rx) = watch::channel(false);
                let session =
                    SyncSession::new(&ctx.config, ctx.store.as_ref(), &ctx.outbox, ctx.remote.as_ref());
                let run = session.run(cursor, cancel_rx);
                tokio::pin!(run);

                let report = loop {
                    tokio::select! {
                        report = &mut run => break report,
                        () = flag_raised(&mut ctx.suppress_rx) => {
                            let _ = cancel_tx.send(true);
                        }
                        () = shutdown_signal(&mut ctx.shutdown_rx) => {
                            let _ = cancel_tx.send(true);
                        }
                    }
                };

                last_session_end = Some(Instant::now());
                cursor = report.new_cursor;
                let mut last_success = None;
                if report.result.outcome.is_failure() {
                    backoff.record_failure(Instant::now());
                } else {
                    backoff.record_success();
                    let now_ms = current_time_ms();
                    state.last_successful_sync_at_ms = Some(now_ms);
                    last_success = Some(now_ms);
                }
                state.consecutive_failures = backoff.consecutive_failures();
                state.remote_cursor = cursor;
                state.last_known_tier = *ctx.tier_rx.borrow();
                if let Err(error) = ctx.state_store.save(&state) {
                    tracing::warn!(%error, "failed to persist scheduler state");
                }

                tracing::info!(
                    outcome = ?report.result.outcome,
                    pushed = report.result.pushed,
                    pulled = report.result.pulled,
                    conflicts = report.result.conflicts.len(),
                    "sync session finished"
                );
                if !report.touched_kinds.is_empty() {
                    let _ = ctx.events.send(SchedulerEvent::MergeCommitted {
                        kinds: report.touched_kinds.clone(),
                    });
                }
                let _ = ctx
                    .events
                    .send(SchedulerEvent::SessionCompleted(report.result.clone()));

                ctx.refresh_status(phase, last_success);
                ctx.set_phase(&mut phase, SchedulerPhase::Cooldown);
            }

            SchedulerPhase::Cooldown => {
                let until =
                    last_session_end.unwrap_or_else(Instant::now) + ctx.config.debounce_interval;
                tokio::select! {
                    () = tokio::time::sleep_until(until) => {}
                    () = shutdown_signal(&mut ctx.shutdown_rx) => break,
                }
                // Edits that arrived during the session or cooldown coalesce
                // into one follow-up window.
                let next = if ctx.outbox.lock().pending_count() > 0 {
                    SchedulerPhase::AwaitingWindow
                } else {
                    SchedulerPhase::Idle
                };
                ctx.set_phase(&mut phase, next);
            }
        }
    }

    state.last_known_tier = *ctx.tier_rx.borrow();
    if let Err(error) = ctx.state_store.save(&state) {
        tracing::warn!(%error, "failed to persist scheduler state at shutdown");
    }
}

/// Resolves on the next change; pends forever once the sender is gone.
async fn changed_or_pending<T>(rx: &mut watch::Receiver<T>) {
    if rx.changed().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Resolves once the flag is (or becomes) true.
async fn flag_raised(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Resolves when shutdown is requested or the handle is gone.
async fn shutdown_signal(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            // Handle dropped without an explicit shutdown.
            return;
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::state::MemoryStateStore;
    use crate::transport::{InMemoryRemote, MockTransport};
    use liftlog_core::{ChangeOp, ChangeRecord, EntityId, MemoryStore, SyncedEntity};
    use liftlog_sync_protocol::SessionOutcome;
    use std::time::Duration;

    fn entity_id(byte: u8) -> EntityId {
        EntityId::from_bytes([byte; 16])
    }

    struct Harness {
        store: Arc<MemoryStore>,
        outbox: Arc<Mutex<Outbox>>,
        tier_tx: watch::Sender<LinkTier>,
        state_store: Arc<MemoryStateStore>,
    }

    impl Harness {
        fn new(initial_tier: LinkTier) -> (Self, watch::Receiver<LinkTier>) {
            let (tier_tx, tier_rx) = watch::channel(initial_tier);
            (
                Self {
                    store: Arc::new(MemoryStore::new()),
                    outbox: Arc::new(Mutex::new(Outbox::new())),
                    tier_tx,
                    state_store: Arc::new(MemoryStateStore::new()),
                },
                tier_rx,
            )
        }

        fn spawn<R: RemoteStore + 'static>(
            &self,
            config: SyncConfig,
            remote: Arc<R>,
            tier_rx: watch::Receiver<LinkTier>,
        ) -> SchedulerHandle {
            SyncScheduler::new(
                config,
                Arc::clone(&self.store) as Arc<dyn LocalStore>,
                Arc::clone(&self.outbox),
                remote,
                tier_rx,
                Arc::clone(&self.state_store) as Arc<dyn StateStore>,
            )
            .spawn()
        }

        fn edit(&self, byte: u8, payload: Vec<u8>, at_ms: u64) {
            let id = entity_id(byte);
            let mut entity = match self.store.read_entity(id).unwrap() {
                Some(mut e) => {
                    e.apply_local_edit(payload.clone(), at_ms);
                    e
                }
                None => SyncedEntity::new(id, EntityKind::SetEntry, payload.clone(), at_ms),
            };
            let record = ChangeRecord {
                sequence: 0,
                entity_id: id,
                kind: EntityKind::SetEntry,
                operation: if entity.local_version == 1 {
                    ChangeOp::Create
                } else {
                    ChangeOp::Update
                },
                payload: Some(payload),
                local_version: entity.local_version,
                updated_at_ms: at_ms,
            };
            self.store.write_entity(entity).unwrap();
            self.outbox.lock().append(record);
        }
    }

    fn fast_config() -> SyncConfig {
        SyncConfig::default()
            .with_debounce_interval(Duration::from_millis(100))
            .with_session_deadline(Duration::from_secs(5))
    }

    async fn next_completion(
        rx: &mut broadcast::Receiver<SchedulerEvent>,
    ) -> SessionResult {
        loop {
            match tokio::time::timeout(Duration::from_secs(600), rx.recv())
                .await
                .expect("no session completed in time")
            {
                Ok(SchedulerEvent::SessionCompleted(result)) => return result,
                Ok(_) => {}
                Err(error) => panic!("event stream closed: {error}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn starts_idle_and_stays_idle_without_work() {
        let (harness, tier_rx) = Harness::new(LinkTier::Good);
        let remote = Arc::new(MockTransport::new());
        let handle = harness.spawn(fast_config(), Arc::clone(&remote), tier_rx);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(handle.status().phase, SchedulerPhase::Idle);
        assert_eq!(remote.push_calls(), 0);
        assert_eq!(remote.pull_calls(), 0);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn enqueued_work_triggers_a_session_on_a_good_link() {
        let (harness, tier_rx) = Harness::new(LinkTier::Good);
        let remote = Arc::new(InMemoryRemote::new());
        let handle = harness.spawn(fast_config(), Arc::clone(&remote), tier_rx);
        let mut events = handle.subscribe();

        harness.edit(1, vec![80], 1_000);
        handle.notify_change_enqueued();

        let result = next_completion(&mut events).await;
        assert_eq!(result.outcome, SessionOutcome::Success);
        assert_eq!(result.pushed, 1);
        assert_eq!(remote.entity_count(), 1);
        assert_eq!(handle.status().pending_records, 0);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn offline_burst_defers_everything() {
        let (harness, tier_rx) = Harness::new(LinkTier::Offline);
        let remote = Arc::new(MockTransport::new());
        let handle = harness.spawn(fast_config(), Arc::clone(&remote), tier_rx);
        let mut events = handle.subscribe();

        for i in 0..50u64 {
            harness.edit(1, vec![i as u8], 1_000 + i);
            handle.notify_change_enqueued();
        }
        tokio::time::sleep(Duration::from_secs(120)).await;
        // Offline: not a single transport call, work queued.
        assert_eq!(remote.push_calls(), 0);
        assert_eq!(handle.status().pending_records, 50);
        assert_eq!(handle.status().phase, SchedulerPhase::AwaitingWindow);

        // Connectivity returns: the burst collapses into one session.
        harness.tier_tx.send(LinkTier::Good).unwrap();
        let result = next_completion(&mut events).await;
        assert_eq!(result.outcome, SessionOutcome::Success);
        assert_eq!(result.pushed, 1);
        assert_eq!(handle.status().pending_records, 0);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn poor_tier_blocks_sessions() {
        let (harness, tier_rx) = Harness::new(LinkTier::Poor);
        let remote = Arc::new(MockTransport::new());
        let handle = harness.spawn(fast_config(), Arc::clone(&remote), tier_rx);

        harness.edit(1, vec![1], 1_000);
        handle.notify_change_enqueued();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(remote.push_calls(), 0);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn workout_suppression_defers_until_cleared() {
        let (harness, tier_rx) = Harness::new(LinkTier::Good);
        let remote = Arc::new(InMemoryRemote::new());
        let handle = harness.spawn(fast_config(), Arc::clone(&remote), tier_rx);
        let mut events = handle.subscribe();

        handle.set_workout_active(true);
        harness.edit(1, vec![1], 1_000);
        handle.notify_change_enqueued();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(remote.entity_count(), 0);
        assert_eq!(handle.status().phase, SchedulerPhase::AwaitingWindow);

        handle.set_workout_active(false);
        let result = next_completion(&mut events).await;
        assert_eq!(result.outcome, SessionOutcome::Success);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn tier_recovery_pulls_even_with_an_empty_outbox() {
        let (harness, tier_rx) = Harness::new(LinkTier::Poor);
        let remote = Arc::new(InMemoryRemote::new());
        remote.seed(liftlog_sync_protocol::EntitySnapshot {
            id: entity_id(4),
            kind: EntityKind::WorkoutDay,
            payload: Some(vec![4]),
            version: 1,
            updated_at_ms: 1_000,
            tombstone: false,
        });
        let handle = harness.spawn(fast_config(), Arc::clone(&remote), tier_rx);
        let mut events = handle.subscribe();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(handle.status().phase, SchedulerPhase::Idle);

        // No local work at all; the link improving is enough.
        harness.tier_tx.send(LinkTier::Good).unwrap();
        let result = next_completion(&mut events).await;
        assert_eq!(result.outcome, SessionOutcome::Success);
        assert_eq!(result.pushed, 0);
        assert_eq!(result.pulled, 1);
        assert!(harness.store.read_entity(entity_id(4)).unwrap().is_some());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failures_back_off_and_recover() {
        let (harness, tier_rx) = Harness::new(LinkTier::Good);
        let remote = Arc::new(MockTransport::new());
        remote.enqueue_push_result(Err(SyncError::transport_retryable("connection reset")));
        let handle = harness.spawn(fast_config(), Arc::clone(&remote), tier_rx);
        let mut events = handle.subscribe();

        harness.edit(1, vec![1], 1_000);
        handle.notify_change_enqueued();

        let first = next_completion(&mut events).await;
        assert_eq!(first.outcome, SessionOutcome::TransportError);

        // The retry happens only after backoff elapses, then succeeds against
        // the drained queue.
        let second = next_completion(&mut events).await;
        assert_eq!(second.outcome, SessionOutcome::Success);
        assert!(remote.push_calls() >= 2);
        assert_eq!(
            harness.state_store.load().unwrap().unwrap().consecutive_failures,
            0
        );
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn foreground_triggers_a_pull_only_session() {
        let (harness, tier_rx) = Harness::new(LinkTier::Good);
        let remote = Arc::new(InMemoryRemote::new());
        remote.seed(liftlog_sync_protocol::EntitySnapshot {
            id: entity_id(7),
            kind: EntityKind::Exercise,
            payload: Some(vec![7]),
            version: 1,
            updated_at_ms: 1_000,
            tombstone: false,
        });
        let handle = harness.spawn(fast_config(), Arc::clone(&remote), tier_rx);
        let mut events = handle.subscribe();

        handle.app_foregrounded();
        let result = next_completion(&mut events).await;
        assert_eq!(result.outcome, SessionOutcome::Success);
        assert_eq!(result.pushed, 0);
        assert_eq!(result.pulled, 1);
        assert!(harness
            .store
            .read_entity(entity_id(7))
            .unwrap()
            .is_some());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn state_survives_restart() {
        let (harness, tier_rx) = Harness::new(LinkTier::Good);
        let remote = Arc::new(InMemoryRemote::new());
        let handle = harness.spawn(fast_config(), Arc::clone(&remote), tier_rx.clone());
        let mut events = handle.subscribe();

        harness.edit(1, vec![1], 1_000);
        handle.notify_change_enqueued();
        next_completion(&mut events).await;
        handle.shutdown().await;

        let saved = harness.state_store.load().unwrap().unwrap();
        assert_eq!(saved.remote_cursor, remote.cursor());
        assert!(saved.last_successful_sync_at_ms.is_some());

        // A second scheduler over the same state store resumes at the saved
        // cursor and does not re-apply old remote history.
        let handle = harness.spawn(fast_config(), Arc::clone(&remote), tier_rx);
        let mut events = handle.subscribe();
        handle.app_foregrounded();
        let result = next_completion(&mut events).await;
        assert_eq!(result.outcome, SessionOutcome::Success);
        assert_eq!(result.pulled, 0);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn merge_events_name_the_touched_kinds() {
        let (harness, tier_rx) = Harness::new(LinkTier::Good);
        let remote = Arc::new(InMemoryRemote::new());
        remote.seed(liftlog_sync_protocol::EntitySnapshot {
            id: entity_id(3),
            kind: EntityKind::PersonalRecord,
            payload: Some(vec![3]),
            version: 1,
            updated_at_ms: 1_000,
            tombstone: false,
        });
        let handle = harness.spawn(fast_config(), Arc::clone(&remote), tier_rx);
        let mut events = handle.subscribe();

        handle.app_foregrounded();
        let kinds = loop {
            match tokio::time::timeout(Duration::from_secs(600), events.recv())
                .await
                .expect("no merge event in time")
                .expect("event stream closed")
            {
                SchedulerEvent::MergeCommitted { kinds } => break kinds,
                _ => {}
            }
        };
        assert_eq!(kinds, vec![EntityKind::PersonalRecord]);
        handle.shutdown().await;
    }
}
