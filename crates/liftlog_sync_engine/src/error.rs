//! Error types for the sync engine.

use liftlog_core::EntityId;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// None of these ever surface as a blocking user-facing error: routine
/// connectivity loss is absorbed by backoff, and the only user-visible signal
/// is the passive sync status.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network or transport failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The session deadline elapsed.
    ///
    /// Retried like a transport error, but logged distinctly for
    /// diagnostics.
    #[error("session deadline exceeded")]
    Timeout,

    /// The session was cancelled cooperatively.
    #[error("session cancelled")]
    Cancelled,

    /// The remote returned a malformed or inconsistent response.
    #[error("remote protocol error: {0}")]
    Protocol(String),

    /// Local invariant violation, fatal to the current session only.
    ///
    /// Example: a dirty entity with no corresponding outbox record. The
    /// session aborts, the inconsistency is logged, and the scheduler may
    /// retry after backoff since the damage is entity-scoped.
    #[error("corrupt local state for entity {entity_id}: {reason}")]
    CorruptState {
        /// The affected entity.
        entity_id: EntityId,
        /// Description of the violated invariant.
        reason: String,
    },

    /// Local store error.
    #[error("store error: {0}")]
    Store(#[from] liftlog_core::CoreError),

    /// Persisted scheduler state could not be read or written.
    #[error("state persistence error: {0}")]
    StatePersistence(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if a later session may succeed after backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout | SyncError::Cancelled => true,
            // Entity-scoped corruption does not poison the process.
            SyncError::CorruptState { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("invalid certificate").is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::Cancelled.is_retryable());
        assert!(!SyncError::Protocol("bad ack".into()).is_retryable());

        let corrupt = SyncError::CorruptState {
            entity_id: EntityId::from_bytes([3u8; 16]),
            reason: "dirty entity with no outbox record".into(),
        };
        assert!(corrupt.is_retryable());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            SyncError::Timeout.to_string(),
            "session deadline exceeded"
        );
        assert!(SyncError::transport_retryable("offline")
            .to_string()
            .contains("offline"));
    }
}
