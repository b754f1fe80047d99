//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for the scheduler and sync sessions.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Wall-clock budget for one session, covering push and pull together.
    pub session_deadline: Duration,
    /// Minimum spacing between consecutive sessions.
    pub debounce_interval: Duration,
    /// Maximum entities per push batch.
    pub push_batch_size: usize,
    /// Maximum entities requested per pull batch.
    pub pull_batch_size: u32,
    /// Backoff policy for failed sessions.
    pub backoff: BackoffConfig,
    /// Round-trip latency above which a reachable link is classified poor.
    pub poor_latency_threshold: Duration,
    /// Probes a candidate tier must hold before a transition is reported.
    pub tier_stable_probes: u32,
    /// Time a candidate tier must hold before a transition is reported.
    ///
    /// A transition commits after `tier_stable_probes` consecutive probes or
    /// this duration, whichever is shorter.
    pub tier_stable_window: Duration,
}

impl SyncConfig {
    /// Sets the session deadline.
    #[must_use]
    pub fn with_session_deadline(mut self, deadline: Duration) -> Self {
        self.session_deadline = deadline;
        self
    }

    /// Sets the debounce interval.
    #[must_use]
    pub fn with_debounce_interval(mut self, interval: Duration) -> Self {
        self.debounce_interval = interval;
        self
    }

    /// Sets the backoff policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the push batch size.
    #[must_use]
    pub fn with_push_batch_size(mut self, size: usize) -> Self {
        self.push_batch_size = size;
        self
    }

    /// Sets the pull batch size.
    #[must_use]
    pub fn with_pull_batch_size(mut self, size: u32) -> Self {
        self.pull_batch_size = size;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            session_deadline: Duration::from_secs(5),
            debounce_interval: Duration::from_secs(10),
            push_batch_size: 100,
            pull_batch_size: 100,
            backoff: BackoffConfig::default(),
            poor_latency_threshold: Duration::from_millis(400),
            tier_stable_probes: 2,
            tier_stable_window: Duration::from_secs(3),
        }
    }
}

/// Exponential backoff policy for failed sessions.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Base delay; also the upper bound of the uniform jitter.
    pub base: Duration,
    /// Cap on the exponential delay, before jitter.
    pub max: Duration,
}

impl BackoffConfig {
    /// Creates a backoff policy.
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            max: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy() {
        let config = SyncConfig::default();
        assert_eq!(config.session_deadline, Duration::from_secs(5));
        assert_eq!(config.debounce_interval, Duration::from_secs(10));
        assert_eq!(config.poor_latency_threshold, Duration::from_millis(400));
        assert_eq!(config.backoff.base, Duration::from_secs(2));
        assert_eq!(config.backoff.max, Duration::from_secs(300));
    }

    #[test]
    fn builder_overrides() {
        let config = SyncConfig::default()
            .with_session_deadline(Duration::from_secs(1))
            .with_debounce_interval(Duration::from_millis(100))
            .with_push_batch_size(10)
            .with_pull_batch_size(20);
        assert_eq!(config.session_deadline, Duration::from_secs(1));
        assert_eq!(config.debounce_interval, Duration::from_millis(100));
        assert_eq!(config.push_batch_size, 10);
        assert_eq!(config.pull_batch_size, 20);
    }
}
