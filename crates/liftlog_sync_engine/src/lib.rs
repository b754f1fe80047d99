//! Offline-first background synchronization engine.
//!
//! Everything here runs behind the application: local reads and writes never
//! wait on the network, and synchronization happens opportunistically in
//! bounded background sessions. The crate is organized around a handful of
//! cooperating pieces:
//!
//! - [`SyncScheduler`] decides *when* to sync, driven by enqueued work,
//!   foreground transitions, link tier changes, and workout suppression
//! - [`SyncSession`] performs one deadline-bounded push-then-pull exchange
//! - [`resolver`] deterministically merges concurrent edits
//! - [`BackoffController`] spaces out retries after failed sessions
//! - [`NetworkMonitor`] debounces reachability probes into link tiers
//! - [`StateStore`] persists the little state that should survive restarts
//!
//! The local store and the remote transport are both capability traits
//! ([`liftlog_core::LocalStore`], [`RemoteStore`]); the engine owns neither
//! schema nor wire format.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backoff;
pub mod config;
pub mod error;
pub mod network;
pub mod resolver;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod transport;

pub use backoff::BackoffController;
pub use config::{BackoffConfig, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use network::{LinkTier, NetworkMonitor, ProbeSample};
pub use scheduler::{
    SchedulerEvent, SchedulerHandle, SchedulerPhase, SyncScheduler, SyncStatus,
};
pub use session::{SessionReport, SyncSession};
pub use state::{JsonStateStore, MemoryStateStore, SchedulerState, StateStore};
pub use transport::{InMemoryRemote, MockTransport, RemoteStore};
