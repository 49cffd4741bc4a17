//! Reference model for model-based testing.
//!
//! The model captures what each peer should observe (anchors, map provider,
//! queued work) with plain collections and no encoding. It serves as the
//! oracle against which real controllers in a [`SimWorld`](crate::SimWorld)
//! are verified.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Behavior, not mechanism: No envelopes, swap ids or snapshot requests
//! - Deterministic: Same inputs produce same outputs

pub mod operation;
mod peer;
mod world;

pub use operation::{Operation, OperationError, OperationResult, PeerId, SmallLabel};
pub use peer::{ModelAnchor, ModelPayload, ModelPeer};
pub use world::{ModelWorld, ObservableState, PeerView};
