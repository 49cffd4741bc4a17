//! Affirm synchronization core.
//!
//! Action-based state machine that keeps a shared AR world consistent across
//! peers. Owns the anchor store, the base-map swap ordering, and the record of
//! which peer supplied the current map.
//!
//! # Architecture
//!
//! The controller is a pure state machine that:
//! - Receives events from the caller (user intents, tracking callbacks,
//!   inbound payloads)
//! - Produces actions for the caller to execute (broadcast, apply a map,
//!   render an anchor)
//! - Uses the `Environment` trait for time (deterministic testing)
//!
//! # Components
//!
//! - [`SyncController`]: Event-driven state machine
//! - [`WorldStateStore`]: Anchors currently held
//! - [`SyncEvent`]: Events fed into the controller
//! - [`SyncAction`]: Actions produced by the controller
//! - [`SessionStatus`]: Snapshot for status rendering

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod controller;
pub mod env;
mod error;
mod event;
mod peer;
mod state;
mod status;
mod store;
mod tracking;

pub use controller::SyncController;
pub use env::Environment;
pub use error::SyncError;
pub use event::{InboundStats, SyncAction, SyncEvent};
pub use peer::Peer;
pub use state::{MapOrigin, SessionPhase, SessionState};
pub use status::SessionStatus;
pub use store::WorldStateStore;
pub use tracking::{LimitedReason, MappingStatus, TrackingState};
