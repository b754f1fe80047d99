//! Retry/backoff controller.
//!
//! One controller per logical link (not per entity). The scheduler consults
//! it before leaving cooldown; it never sleeps or performs I/O itself.

use crate::config::BackoffConfig;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// Stateful policy computing the next eligible retry time after failures.
#[derive(Debug)]
pub struct BackoffController {
    config: BackoffConfig,
    consecutive_failures: u32,
    next_eligible: Option<Instant>,
}

impl BackoffController {
    /// Creates a controller with no recorded failures.
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
            next_eligible: None,
        }
    }

    /// Restores a controller from a persisted failure count.
    ///
    /// The restored controller schedules its next eligible time from `now`,
    /// so restarting the process does not reset backoff.
    #[must_use]
    pub fn from_failures(config: BackoffConfig, consecutive_failures: u32, now: Instant) -> Self {
        let mut controller = Self {
            config,
            consecutive_failures,
            next_eligible: None,
        };
        if consecutive_failures > 0 {
            controller.next_eligible = Some(now + controller.current_delay());
        }
        controller
    }

    /// Records a failed session and schedules the next eligible attempt.
    pub fn record_failure(&mut self, now: Instant) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.next_eligible = Some(now + self.current_delay());
    }

    /// Records a successful session, resetting the failure count.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.next_eligible = None;
    }

    /// Returns true when an attempt is allowed at `now`.
    #[must_use]
    pub fn can_attempt(&self, now: Instant) -> bool {
        self.next_eligible.is_none_or(|t| now >= t)
    }

    /// The instant the next attempt becomes eligible, if one is scheduled.
    #[must_use]
    pub fn next_eligible(&self) -> Option<Instant> {
        self.next_eligible
    }

    /// Current consecutive failure count.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// `min(max, base * 2^(failures - 1)) + jitter`, jitter uniform in
    /// `[0, base]`.
    fn current_delay(&self) -> Duration {
        let exponent = self.consecutive_failures.saturating_sub(1).min(31);
        let exponential = self
            .config
            .base
            .saturating_mul(1u32 << exponent)
            .min(self.config.max);

        let jitter_ms = rand::thread_rng().gen_range(0..=self.config.base.as_millis() as u64);
        exponential + Duration::from_millis(jitter_ms)
    }
}
