//! Deterministic multi-peer world driving real controllers.
//!
//! Every peer runs a real [`SyncController`] over a shared [`SimEnv`].
//! Broadcasts land in each other peer's inbox and stay there until the test
//! delivers them, so interleavings are chosen explicitly. Snapshot requests
//! are answered at once from the peer's store; base-map swaps stay in flight
//! until [`SimWorld::complete_swap`].

use std::collections::VecDeque;

use affirm_core::{
    Environment, MappingStatus, Peer, SyncAction, SyncController, SyncError, SyncEvent, TrackingState,
};
use affirm_proto::{Anchor, PROTOCOL_VERSION, ProtocolError, Transform, WorldMap};
use bytes::Bytes;
use serde::Serialize;

use crate::sim_env::SimEnv;

/// Index of a peer in a [`SimWorld`].
pub type PeerIndex = usize;

struct SimPeer {
    peer: Peer,
    controller: SyncController<SimEnv>,
    inbox: VecDeque<(Peer, Bytes)>,
    pending_swap: Option<u64>,
    broadcasts: u64,
}

/// A set of peers exchanging real encoded payloads.
pub struct SimWorld {
    env: SimEnv,
    peers: Vec<SimPeer>,
}

impl SimWorld {
    /// Create `num_peers` peers whose sessions have started and mapped their
    /// surroundings.
    pub fn new(num_peers: usize, seed: u64) -> Self {
        let mut world = Self::unstarted(num_peers, seed);
        for index in 0..num_peers {
            let _ = world.handle(index, SyncEvent::SessionStarted);
            world.frame(index);
        }
        world
    }

    /// Create `num_peers` peers whose tracking has not started.
    pub fn unstarted(num_peers: usize, seed: u64) -> Self {
        let env = SimEnv::with_seed(seed);
        let peers = (0..num_peers)
            .map(|i| SimPeer {
                peer: Peer::new(env.random_u64(), format!("peer-{i}")),
                controller: SyncController::new(env.clone()),
                inbox: VecDeque::new(),
                pending_swap: None,
                broadcasts: 0,
            })
            .collect();

        Self { env, peers }
    }

    /// Shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Number of peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// True if the world has no peers.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Identity of a peer.
    ///
    /// # Panics
    ///
    /// If `index` is out of range.
    pub fn peer(&self, index: PeerIndex) -> &Peer {
        &self.peers[index].peer
    }

    /// Index of the peer with `id`.
    pub fn index_of(&self, peer: &Peer) -> Option<PeerIndex> {
        self.peers.iter().position(|p| p.peer.id == peer.id)
    }

    /// A peer's controller.
    pub fn controller(&self, index: PeerIndex) -> &SyncController<SimEnv> {
        &self.peers[index].controller
    }

    /// Anchors a peer holds.
    pub fn anchors(&self, index: PeerIndex) -> &[Anchor] {
        self.peers[index].controller.store().anchors()
    }

    /// Payloads waiting in a peer's inbox.
    pub fn pending(&self, index: PeerIndex) -> usize {
        self.peers[index].inbox.len()
    }

    /// True if a peer has a base-map swap in flight.
    pub fn is_swapping(&self, index: PeerIndex) -> bool {
        self.peers[index].pending_swap.is_some()
    }

    /// Broadcasts a peer has sent.
    pub fn broadcasts(&self, index: PeerIndex) -> u64 {
        self.peers[index].broadcasts
    }

    /// Feed an event and execute the resulting actions.
    pub fn handle(&mut self, index: PeerIndex, event: SyncEvent) -> Result<(), SyncError> {
        let mut events = VecDeque::from([event]);
        let mut first_error = None;

        while let Some(event) = events.pop_front() {
            match self.peers[index].controller.handle(event) {
                Ok(actions) => self.execute(index, actions, &mut events),
                Err(e) => {
                    first_error.get_or_insert(e);
                },
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Report a mapped frame with normal tracking.
    pub fn frame(&mut self, index: PeerIndex) {
        let _ = self.handle(
            index,
            SyncEvent::FrameUpdated { mapping: MappingStatus::Mapped, tracking: TrackingState::Normal },
        );
    }

    /// Place an anchor.
    pub fn place(
        &mut self,
        index: PeerIndex,
        label: &str,
        transform: Transform,
    ) -> Result<(), SyncError> {
        self.handle(index, SyncEvent::PlaceAnchor { label: label.to_string(), transform })
    }

    /// Share the current map.
    pub fn share(&mut self, index: PeerIndex) -> Result<(), SyncError> {
        self.handle(index, SyncEvent::ShareMap)
    }

    /// Reset the world.
    pub fn reset(&mut self, index: PeerIndex, confirmed: bool) {
        let _ = self.handle(index, SyncEvent::ResetWorld { confirmed });
    }

    /// Put raw bytes from `from` into a peer's inbox.
    pub fn inject(&mut self, index: PeerIndex, from: Peer, bytes: Bytes) {
        self.peers[index].inbox.push_back((from, bytes));
    }

    /// Deliver the oldest payload in a peer's inbox. `None` if it is empty.
    pub fn deliver_next(&mut self, index: PeerIndex) -> Option<Result<(), SyncError>> {
        let (from, bytes) = self.peers[index].inbox.pop_front()?;
        Some(self.handle(index, SyncEvent::DataReceived { bytes, from }))
    }

    /// Finish the in-flight swap. Returns false if none was in flight.
    pub fn complete_swap(&mut self, index: PeerIndex) -> bool {
        let Some(swap) = self.peers[index].pending_swap.take() else {
            return false;
        };
        let _ = self.handle(index, SyncEvent::BaseMapApplied { swap });
        true
    }

    /// Deliver everything and finish every swap until nothing is left.
    pub fn settle(&mut self) {
        loop {
            let mut progressed = false;
            for index in 0..self.peers.len() {
                while self.deliver_next(index).is_some() {
                    progressed = true;
                }
                progressed |= self.complete_swap(index);
            }
            if !progressed {
                break;
            }
        }
    }

    fn execute(&mut self, index: PeerIndex, actions: Vec<SyncAction>, events: &mut VecDeque<SyncEvent>) {
        for action in actions {
            match action {
                SyncAction::Broadcast { payload, .. } => {
                    let from = self.peers[index].peer.clone();
                    self.peers[index].broadcasts += 1;
                    for (i, peer) in self.peers.iter_mut().enumerate() {
                        if i != index {
                            peer.inbox.push_back((from.clone(), payload.clone()));
                        }
                    }
                },
                SyncAction::RequestSnapshot { request } => {
                    let anchors = self.anchors(index).to_vec();
                    let data = self.peers[index].peer.id.to_be_bytes().to_vec();
                    events.push_back(SyncEvent::SnapshotReady {
                        request,
                        result: Ok(WorldMap::new(data, anchors)),
                    });
                },
                SyncAction::ApplyBaseMap { swap, .. } => {
                    self.peers[index].pending_swap = Some(swap);
                },
                SyncAction::ResetTracking => self.peers[index].pending_swap = None,
                SyncAction::AnchorAdded(_) | SyncAction::AnchorsCleared => {},
            }
        }
    }
}

#[derive(Serialize)]
struct ForeignEnvelope {
    version: u8,
    kind: u16,
    body: ciborium::Value,
}

/// A well-formed envelope with a null body carrying `kind`, as a newer peer
/// would send. `kind` must not be a known kind.
pub fn unknown_kind_payload(kind: u16) -> Result<Bytes, ProtocolError> {
    let envelope =
        ForeignEnvelope { version: PROTOCOL_VERSION, kind, body: ciborium::Value::Null };
    let mut buf = Vec::new();
    ciborium::ser::into_writer(&envelope, &mut buf)
        .map_err(|e| ProtocolError::Encode { reason: e.to_string() })?;
    Ok(Bytes::from(buf))
}
