//! RestroSync: client-side replicated-state synchronization engine.
//!
//! Keeps a process's copy of the shared application state tree consistent
//! with one authoritative server while staying responsive: local writes
//! apply immediately (optimistic UI), changes fan out to other processes on
//! the same device, and the authority's snapshots and deltas reconcile
//! everything after connection loss.
//!
//! The two halves:
//! - [`bus::EventBus`]: one publish/subscribe surface over in-process
//!   listeners, the same-device broadcast hub, and the WebSocket link to the
//!   authority, with loop prevention across all three.
//! - [`store::Store`]: the path-addressable state tree with a durable local
//!   copy and reconciliation against authoritative messages.

pub mod bus;
pub mod config;
pub mod path;
pub mod protocol;
pub mod store;

pub use bus::{topics, BroadcastHub, ConnectionState, EventBus, Origin, Subscription};
pub use config::SyncConfig;
pub use store::{StateFile, Store, StoreError};
