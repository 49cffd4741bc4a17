//! In-process peer mesh.
//!
//! Every `MemoryChannel` joined to the same `MemoryMesh` receives every other
//! member's broadcasts, in send order. Payloads sent to a member that has not
//! installed a handler yet are held until it does.
//!
//! The mesh can also inject raw bytes (for malformed or unknown payloads) and
//! fail a member's next sends (for exercising the broadcast retry policy).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use affirm_core::Peer;
use async_trait::async_trait;
use bytes::Bytes;

use crate::channel::{ChannelError, PeerChannel, ReceiveHandler};

struct Member {
    peer: Peer,
    handler: Option<Arc<ReceiveHandler>>,
    pending: Vec<(Bytes, Peer)>,
    failing_sends: u32,
}

#[derive(Default)]
struct MeshInner {
    members: Vec<Member>,
}

/// Shared in-process broadcast medium.
#[derive(Clone, Default)]
pub struct MemoryMesh {
    inner: Arc<Mutex<MeshInner>>,
}

impl MemoryMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect `peer` and return its channel.
    pub fn join(&self, peer: Peer) -> MemoryChannel {
        let mut inner = self.lock();
        inner.members.retain(|m| m.peer.id != peer.id);
        inner.members.push(Member {
            peer: peer.clone(),
            handler: None,
            pending: Vec::new(),
            failing_sends: 0,
        });
        tracing::debug!(%peer, members = inner.members.len(), "peer joined mesh");

        MemoryChannel { mesh: self.clone(), local: peer }
    }

    /// Disconnect a peer. Later broadcasts no longer reach it.
    pub fn leave(&self, peer: &Peer) {
        self.lock().members.retain(|m| m.peer.id != peer.id);
        tracing::debug!(%peer, "peer left mesh");
    }

    /// Peers currently connected.
    pub fn peers(&self) -> Vec<Peer> {
        self.lock().members.iter().map(|m| m.peer.clone()).collect()
    }

    /// Deliver raw bytes from `from` to every other member.
    pub fn inject(&self, from: &Peer, payload: Bytes) {
        self.deliver(from, &payload);
    }

    /// Make the next `count` broadcasts from `peer` fail.
    pub fn fail_next_sends(&self, peer: &Peer, count: u32) {
        if let Some(member) = self.lock().members.iter_mut().find(|m| m.peer.id == peer.id) {
            member.failing_sends = count;
        }
    }

    fn lock(&self) -> MutexGuard<'_, MeshInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_failure(&self, peer: &Peer) -> bool {
        let mut inner = self.lock();
        match inner.members.iter_mut().find(|m| m.peer.id == peer.id) {
            Some(member) if member.failing_sends > 0 => {
                member.failing_sends -= 1;
                true
            },
            _ => false,
        }
    }

    fn deliver(&self, from: &Peer, payload: &Bytes) {
        // Handlers run outside the lock; a handler may broadcast in turn.
        let handlers: Vec<Arc<ReceiveHandler>> = {
            let mut inner = self.lock();
            let mut handlers = Vec::new();
            for member in inner.members.iter_mut().filter(|m| m.peer.id != from.id) {
                match &member.handler {
                    Some(handler) => handlers.push(Arc::clone(handler)),
                    None => member.pending.push((payload.clone(), from.clone())),
                }
            }
            handlers
        };

        for handler in handlers {
            handler(payload.clone(), from.clone());
        }
    }
}

/// One member's view of a [`MemoryMesh`].
#[derive(Clone)]
pub struct MemoryChannel {
    mesh: MemoryMesh,
    local: Peer,
}

#[async_trait]
impl PeerChannel for MemoryChannel {
    fn local_peer(&self) -> Peer {
        self.local.clone()
    }

    fn current_peers(&self) -> Vec<Peer> {
        self.mesh.peers().into_iter().filter(|p| p.id != self.local.id).collect()
    }

    async fn broadcast(&self, payload: Bytes) -> Result<(), ChannelError> {
        if !self.mesh.lock().members.iter().any(|m| m.peer.id == self.local.id) {
            return Err(ChannelError::Closed);
        }

        if self.mesh.take_failure(&self.local) {
            return Err(ChannelError::SendFailed {
                peer: self.local.clone(),
                reason: "injected send failure".to_string(),
            });
        }

        self.mesh.deliver(&self.local, &payload);
        Ok(())
    }

    fn on_receive(&self, handler: ReceiveHandler) {
        let handler = Arc::new(handler);
        let pending = {
            let mut inner = self.mesh.lock();
            match inner.members.iter_mut().find(|m| m.peer.id == self.local.id) {
                Some(member) => {
                    member.handler = Some(Arc::clone(&handler));
                    std::mem::take(&mut member.pending)
                },
                None => Vec::new(),
            }
        };

        for (payload, from) in pending {
            handler(payload, from);
        }
    }
}
