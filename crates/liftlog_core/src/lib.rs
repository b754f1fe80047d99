//! # LiftLog Core
//!
//! Local data model and store capabilities for the LiftLog sync engine.
//!
//! This crate provides:
//! - `EntityId` / `EntityKind` identity types
//! - `SyncedEntity` with local/remote version counters and tombstones
//! - `Outbox`, the durable queue of not-yet-confirmed local mutations
//! - `LocalStore`, the capability trait the sync engine reads and writes
//!   through (plus an in-memory reference implementation with a change feed)
//! - `DerivedCache` for lazily recomputed aggregates
//!
//! Nothing in this crate performs network I/O. The interactive path only
//! touches the local store and the outbox, both of which are synchronous and
//! never block on network state.
//!
//! ## Key Invariants
//!
//! - An entity is dirty exactly when `local_version > remote_version`
//! - For a given entity, replaying its outbox records in sequence order
//!   reproduces its current local state
//! - An outbox record retires only after the remote acknowledges that exact
//!   sequence number for that entity
//! - A stale derived aggregate is never served as fresh

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod derived;
mod entity;
mod error;
mod outbox;
mod store;
mod types;

pub use derived::{DerivationKind, DerivedCache};
pub use entity::{current_time_ms, SyncedEntity};
pub use error::{CoreError, CoreResult};
pub use outbox::{ChangeOp, ChangeRecord, Outbox};
pub use store::{LocalStore, MemoryStore, StoreEvent, StoreEventKind};
pub use types::{EntityId, EntityKind};
