//! Model peer.

use std::collections::VecDeque;

use super::operation::{OperationError, OperationResult, PeerId};

/// Anchor as the model sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAnchor {
    /// Label text.
    pub label: String,
    /// X coordinate of the pose.
    pub x: i8,
}

/// Payload waiting in a model peer's inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelPayload {
    /// Shared map with the sender's anchors at share time.
    Map {
        /// Sender.
        from: PeerId,
        /// Anchors carried by the map.
        anchors: Vec<ModelAnchor>,
    },
    /// Single anchor.
    Anchor(ModelAnchor),
    /// Undecodable bytes.
    Garbage,
    /// Envelope of an unknown kind.
    Unknown,
}

#[derive(Debug, Clone)]
enum Queued {
    Map { from: PeerId, anchors: Vec<ModelAnchor> },
    Anchor(ModelAnchor),
}

/// Model peer - simplified controller.
///
/// Work arriving while a swap is in flight waits in `backlog` and is applied
/// in arrival order once the swap completes.
#[derive(Debug, Clone)]
pub struct ModelPeer {
    anchors: Vec<ModelAnchor>,
    provider: Option<PeerId>,
    mapped: bool,
    swap: Option<(PeerId, Vec<ModelAnchor>)>,
    backlog: VecDeque<Queued>,
    inbox: VecDeque<ModelPayload>,
}

impl ModelPeer {
    /// A started peer that has mapped its surroundings.
    pub fn new() -> Self {
        Self {
            anchors: Vec::new(),
            provider: None,
            mapped: true,
            swap: None,
            backlog: VecDeque::new(),
            inbox: VecDeque::new(),
        }
    }

    /// Anchors held.
    pub fn anchors(&self) -> &[ModelAnchor] {
        &self.anchors
    }

    /// Peer whose map was adopted last.
    pub fn provider(&self) -> Option<PeerId> {
        self.provider
    }

    /// True while a received map is being applied.
    pub fn is_swapping(&self) -> bool {
        self.swap.is_some()
    }

    /// Payloads not yet delivered.
    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    /// Place a local anchor.
    pub fn place(&mut self, anchor: ModelAnchor) {
        self.enqueue(Queued::Anchor(anchor));
    }

    /// What a shared map would carry.
    pub fn snapshot(&self) -> Result<Vec<ModelAnchor>, OperationError> {
        if self.mapped { Ok(self.anchors.clone()) } else { Err(OperationError::MapUnavailable) }
    }

    /// Queue a payload for delivery.
    pub fn receive(&mut self, payload: ModelPayload) {
        self.inbox.push_back(payload);
    }

    /// Process the oldest payload.
    pub fn deliver(&mut self) -> OperationResult {
        match self.inbox.pop_front() {
            None => OperationResult::Error(OperationError::NothingPending),
            Some(ModelPayload::Garbage) => OperationResult::Error(OperationError::Malformed),
            Some(ModelPayload::Unknown) => OperationResult::Error(OperationError::Unrecognized),
            Some(ModelPayload::Anchor(anchor)) => {
                self.enqueue(Queued::Anchor(anchor));
                OperationResult::Ok
            },
            Some(ModelPayload::Map { from, anchors }) => {
                self.enqueue(Queued::Map { from, anchors });
                OperationResult::Ok
            },
        }
    }

    /// Finish the in-flight swap.
    pub fn complete_swap(&mut self) -> OperationResult {
        let Some((from, anchors)) = self.swap.take() else {
            return OperationResult::Error(OperationError::NothingPending);
        };
        self.anchors.extend(anchors);
        self.provider = Some(from);
        self.drain();
        OperationResult::Ok
    }

    /// A mapped frame arrived.
    pub fn frame(&mut self) {
        self.mapped = true;
    }

    /// Reset the world. The inbox is network state and survives.
    pub fn reset(&mut self, confirmed: bool) {
        if !confirmed {
            return;
        }
        self.anchors.clear();
        self.provider = None;
        self.mapped = false;
        self.swap = None;
        self.backlog.clear();
    }

    fn enqueue(&mut self, item: Queued) {
        self.backlog.push_back(item);
        self.drain();
    }

    fn drain(&mut self) {
        while self.swap.is_none() {
            match self.backlog.pop_front() {
                None => break,
                Some(Queued::Anchor(anchor)) => self.anchors.push(anchor),
                Some(Queued::Map { from, anchors }) => {
                    self.anchors.clear();
                    self.swap = Some((from, anchors));
                },
            }
        }
    }
}

impl Default for ModelPeer {
    fn default() -> Self {
        Self::new()
    }
}
