//! Error types for LiftLog core.

use crate::types::EntityId;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in local store and outbox operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity not found in the local store.
    #[error("entity not found: {entity_id}")]
    EntityNotFound {
        /// The entity ID that was not found.
        entity_id: EntityId,
    },

    /// Entity payload cannot be interpreted.
    ///
    /// This is the quarantine path: a session skips the entity, flags it,
    /// and continues with the rest of the batch.
    #[error("corrupt payload for entity {entity_id}: {reason}")]
    PayloadCorrupt {
        /// The affected entity.
        entity_id: EntityId,
        /// Description of the corruption.
        reason: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}
