//! Deterministic simulation harness for Affirm world synchronization.
//!
//! Seeded implementations of the `Environment` trait and a multi-peer world
//! with explicit delivery, for reproducible testing of message interleavings.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation for model-based
//! testing. Operations are applied to both the model and a [`SimWorld`] of
//! real controllers, and their observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod sim_env;
pub mod sim_world;

pub use model::{
    ModelAnchor, ModelPayload, ModelPeer, ModelWorld, ObservableState, Operation, OperationError,
    OperationResult, PeerId, PeerView, SmallLabel,
};
pub use sim_env::SimEnv;
pub use sim_world::{PeerIndex, SimWorld, unknown_kind_payload};
