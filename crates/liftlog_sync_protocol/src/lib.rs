//! # LiftLog Sync Protocol
//!
//! Protocol types for the LiftLog sync engine.
//!
//! This crate provides:
//! - `EntitySnapshot` wire form of an entity
//! - Push/pull messages with per-entity acknowledgments
//! - `ConflictReport` for auditable merge history
//! - `SessionResult` describing one bounded sync exchange
//!
//! This is a pure protocol crate with no I/O operations. Types carry serde
//! derives; the concrete wire encoding used by a remote provider is outside
//! this contract.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod messages;
mod report;
mod snapshot;

pub use messages::{PullRequest, PullResponse, PulledEntity, PushAck, PushEntry, PushRequest, PushResponse};
pub use report::{ConflictReport, ResolutionStrategy, SessionOutcome, SessionResult};
pub use snapshot::EntitySnapshot;
