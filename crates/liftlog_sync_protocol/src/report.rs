//! Conflict reports and session results.

use liftlog_core::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The rule that decided a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionStrategy {
    /// The side with the higher update timestamp won.
    Timestamp,
    /// Timestamps tied exactly; the lexicographically larger entity ID won.
    IdTieBreak,
    /// A tombstone won regardless of timestamps.
    Tombstone,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolutionStrategy::Timestamp => "timestamp",
            ResolutionStrategy::IdTieBreak => "id_tie_break",
            ResolutionStrategy::Tombstone => "tombstone",
        };
        f.write_str(name)
    }
}

/// Audit record of one conflict resolution.
///
/// Every resolution produces a report, even when one side trivially wins, so
/// merge history stays auditable and cache invalidation sees every merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    /// The conflicted entity.
    pub entity_id: EntityId,
    /// Local version counter at resolution time.
    pub local_version: u64,
    /// Remote version counter at resolution time.
    pub remote_version: u64,
    /// The rule that decided the winner.
    pub strategy: ResolutionStrategy,
    /// True when the remote side won wholesale.
    pub remote_won: bool,
    /// Sync attributes of the losing side that were overwritten.
    ///
    /// Resolution is entity-granular, so this lists top-level attributes
    /// (`payload`, `updated_at_ms`, `tombstone`) rather than domain fields.
    pub fields_overwritten: Vec<String>,
}

/// How a sync session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionOutcome {
    /// Push and pull both completed inside the deadline.
    Success,
    /// The deadline elapsed before the exchange completed.
    Timeout,
    /// The transport failed.
    TransportError,
    /// The session was cancelled cooperatively.
    ///
    /// Treated exactly like a timeout for retry purposes.
    Cancelled,
}

impl SessionOutcome {
    /// Returns true when the scheduler should consult backoff before the
    /// next attempt.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !matches!(self, SessionOutcome::Success)
    }
}

/// Result of one bounded push-then-pull exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    /// Session start, milliseconds since the Unix epoch.
    pub started_at_ms: u64,
    /// The wall-clock budget the session ran under (push and pull combined).
    pub deadline: Duration,
    /// How the session ended.
    pub outcome: SessionOutcome,
    /// Entities confirmed written to the remote.
    pub pushed: u64,
    /// Entities applied from the remote.
    pub pulled: u64,
    /// Every conflict resolved during the session.
    pub conflicts: Vec<ConflictReport>,
}
