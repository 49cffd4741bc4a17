//! Model world - orchestrates model peers.
//!
//! The world is the top-level container that manages model state and applies
//! operations. It's the oracle against which the real controllers are
//! verified.

use super::{
    operation::{Operation, OperationResult, PeerId},
    peer::{ModelAnchor, ModelPayload, ModelPeer},
};
use crate::sim_world::SimWorld;

/// One peer's observable state.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerView {
    /// Anchors as `(label, x)`, in store order.
    pub anchors: Vec<(String, f64)>,
    /// Index of the map provider.
    pub provider: Option<usize>,
    /// Swap in flight.
    pub swapping: bool,
    /// Undelivered payloads.
    pub pending: usize,
}

/// Observable state for oracle comparison.
///
/// This is the subset of world state that can be compared against the real
/// implementation.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservableState {
    /// Per-peer views, indexed by peer.
    pub peers: Vec<PeerView>,
}

impl ObservableState {
    /// Observable state of real controllers.
    pub fn of_sim(world: &SimWorld) -> Self {
        let peers = (0..world.len())
            .map(|i| PeerView {
                anchors: world
                    .anchors(i)
                    .iter()
                    .map(|a| (a.label.clone(), a.transform.position()[0]))
                    .collect(),
                provider: world.controller(i).map_provider().and_then(|p| world.index_of(p)),
                swapping: world.is_swapping(i),
                pending: world.pending(i),
            })
            .collect();
        Self { peers }
    }
}

/// Model world - the reference implementation.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    /// Model peers (indexed by `PeerId`).
    peers: Vec<ModelPeer>,
}

impl ModelWorld {
    /// Create a model world with `num_peers` started, mapped peers.
    pub fn new(num_peers: usize) -> Self {
        Self { peers: (0..num_peers).map(|_| ModelPeer::new()).collect() }
    }

    /// Number of peers in the world.
    pub fn num_peers(&self) -> usize {
        self.peers.len()
    }

    /// Get a peer by ID.
    pub fn peer(&self, id: PeerId) -> Option<&ModelPeer> {
        self.peers.get(usize::from(id))
    }

    /// Apply an operation and return the result.
    ///
    /// Operations naming a peer outside the world are ignored.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Place { peer, label, x } => {
                let anchor = ModelAnchor { label: label.text(), x: *x };
                self.with_peer(*peer, |p| p.place(anchor.clone()));
                self.broadcast(*peer, &ModelPayload::Anchor(anchor));
                OperationResult::Ok
            },
            Operation::Share { peer } => {
                let Some(sharer) = self.peers.get(usize::from(*peer)) else {
                    return OperationResult::Ok;
                };
                match sharer.snapshot() {
                    Ok(anchors) => {
                        self.broadcast(*peer, &ModelPayload::Map { from: *peer, anchors });
                        OperationResult::Ok
                    },
                    Err(e) => OperationResult::Error(e),
                }
            },
            Operation::Deliver { peer } => {
                self.with_peer(*peer, ModelPeer::deliver).unwrap_or(OperationResult::Ok)
            },
            Operation::CompleteSwap { peer } => {
                self.with_peer(*peer, ModelPeer::complete_swap).unwrap_or(OperationResult::Ok)
            },
            Operation::Frame { peer } => {
                self.with_peer(*peer, ModelPeer::frame);
                OperationResult::Ok
            },
            Operation::Reset { peer, confirmed } => {
                self.with_peer(*peer, |p| p.reset(*confirmed));
                OperationResult::Ok
            },
            Operation::Garbage { peer, .. } => {
                self.with_peer(*peer, |p| p.receive(ModelPayload::Garbage));
                OperationResult::Ok
            },
            Operation::Unknown { peer, .. } => {
                self.with_peer(*peer, |p| p.receive(ModelPayload::Unknown));
                OperationResult::Ok
            },
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        let peers = self
            .peers
            .iter()
            .map(|p| PeerView {
                anchors: p.anchors().iter().map(|a| (a.label.clone(), f64::from(a.x))).collect(),
                provider: p.provider().map(usize::from),
                swapping: p.is_swapping(),
                pending: p.pending(),
            })
            .collect();
        ObservableState { peers }
    }

    fn with_peer<T>(&mut self, id: PeerId, f: impl FnOnce(&mut ModelPeer) -> T) -> Option<T> {
        self.peers.get_mut(usize::from(id)).map(f)
    }

    fn broadcast(&mut self, from: PeerId, payload: &ModelPayload) {
        for (i, peer) in self.peers.iter_mut().enumerate() {
            if i != usize::from(from) {
                peer.receive(payload.clone());
            }
        }
    }
}
