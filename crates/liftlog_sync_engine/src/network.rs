//! Network quality monitor.
//!
//! Classifies probe samples into discrete link tiers and reports tier
//! *transitions* only, debounced so a flapping link cannot oscillate the
//! scheduler. The monitor never triggers a sync attempt itself; that decision
//! belongs to the scheduler.

use crate::config::SyncConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Discrete link quality classification used to gate sync attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkTier {
    /// No reachable path.
    Offline,
    /// A path exists but is weak or slow.
    Poor,
    /// A usable path.
    Good,
}

impl fmt::Display for LinkTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkTier::Offline => "offline",
            LinkTier::Poor => "poor",
            LinkTier::Good => "good",
        };
        f.write_str(name)
    }
}

/// One reachability probe observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSample {
    /// Whether any path is reachable.
    pub reachable: bool,
    /// Whether the path is cellular with low signal.
    pub cellular_low_signal: bool,
    /// Measured round-trip latency, if the probe completed.
    pub rtt: Option<Duration>,
}

impl ProbeSample {
    /// A probe that found no reachable path.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            reachable: false,
            cellular_low_signal: false,
            rtt: None,
        }
    }

    /// A probe over a healthy path.
    #[must_use]
    pub fn good(rtt: Duration) -> Self {
        Self {
            reachable: true,
            cellular_low_signal: false,
            rtt: Some(rtt),
        }
    }

    /// A probe over a weak cellular path.
    #[must_use]
    pub fn cellular_weak(rtt: Duration) -> Self {
        Self {
            reachable: true,
            cellular_low_signal: true,
            rtt: Some(rtt),
        }
    }
}

struct Candidate {
    tier: LinkTier,
    first_seen: Instant,
    probes: u32,
}

/// Observes probe samples and publishes debounced tier transitions.
///
/// A candidate tier must hold for a configured number of consecutive probes
/// or a configured window, whichever is shorter, before a transition is
/// committed and published.
pub struct NetworkMonitor {
    poor_latency_threshold: Duration,
    stable_probes: u32,
    stable_window: Duration,
    tier_tx: watch::Sender<LinkTier>,
    candidate: Option<Candidate>,
}

impl NetworkMonitor {
    /// Creates a monitor starting at the given tier.
    ///
    /// The initial tier typically comes from persisted scheduler state.
    #[must_use]
    pub fn new(config: &SyncConfig, initial: LinkTier) -> Self {
        let (tier_tx, _) = watch::channel(initial);
        Self {
            poor_latency_threshold: config.poor_latency_threshold,
            stable_probes: config.tier_stable_probes.max(1),
            stable_window: config.tier_stable_window,
            tier_tx,
            candidate: None,
        }
    }

    /// The current committed tier.
    #[must_use]
    pub fn current(&self) -> LinkTier {
        *self.tier_tx.borrow()
    }

    /// Subscribes to committed tier transitions.
    ///
    /// The receiver observes a notification exactly on transitions, never on
    /// every probe.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LinkTier> {
        self.tier_tx.subscribe()
    }

    /// Ingests one probe sample.
    ///
    /// Returns the new tier when this sample commits a transition.
    pub fn observe(&mut self, sample: ProbeSample) -> Option<LinkTier> {
        let tier = self.classify(sample);
        if tier == self.current() {
            self.candidate = None;
            return None;
        }

        let now = Instant::now();
        let committed = match &mut self.candidate {
            Some(candidate) if candidate.tier == tier => {
                candidate.probes += 1;
                candidate.probes >= self.stable_probes
                    || now.duration_since(candidate.first_seen) >= self.stable_window
            }
            _ => {
                self.candidate = Some(Candidate {
                    tier,
                    first_seen: now,
                    probes: 1,
                });
                self.stable_probes == 1
            }
        };

        if committed {
            self.candidate = None;
            tracing::info!(from = %self.current(), to = %tier, "link tier changed");
            let _ = self.tier_tx.send(tier);
            Some(tier)
        } else {
            None
        }
    }

    fn classify(&self, sample: ProbeSample) -> LinkTier {
        if !sample.reachable {
            return LinkTier::Offline;
        }
        let slow = sample
            .rtt
            .is_some_and(|rtt| rtt > self.poor_latency_threshold);
        if sample.cellular_low_signal || slow {
            LinkTier::Poor
        } else {
            LinkTier::Good
        }
    }
}
