//! Operations for model-based testing.
//!
//! Operations represent everything that can happen to a set of peers. They
//! are generated randomly by proptest and applied to both the model and the
//! real controllers.

use arbitrary::Arbitrary;

/// Peer identifier (0-indexed).
pub type PeerId = u8;

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Peer places a label at a pose.
    Place {
        /// Peer placing the anchor.
        peer: PeerId,
        /// Label to place.
        label: SmallLabel,
        /// X coordinate of the pose.
        x: i8,
    },

    /// Peer shares its current map.
    Share {
        /// Sharing peer.
        peer: PeerId,
    },

    /// Peer processes the oldest payload in its inbox.
    Deliver {
        /// Receiving peer.
        peer: PeerId,
    },

    /// Peer's tracking finishes re-initializing against a received map.
    CompleteSwap {
        /// Peer whose swap completes.
        peer: PeerId,
    },

    /// Peer reports a mapped frame.
    Frame {
        /// Reporting peer.
        peer: PeerId,
    },

    /// Peer resets its world.
    Reset {
        /// Resetting peer.
        peer: PeerId,
        /// Whether the user confirmed.
        confirmed: bool,
    },

    /// An outsider sends bytes that are not an envelope.
    Garbage {
        /// Receiving peer.
        peer: PeerId,
        /// Content seed.
        seed: u8,
    },

    /// An outsider sends an envelope of a kind nobody knows.
    Unknown {
        /// Receiving peer.
        peer: PeerId,
        /// Kind offset (mapped to an unused kind).
        kind: u8,
    },
}

impl Operation {
    /// Same operation with the peer index reduced to `num_peers`.
    pub fn clamp(self, num_peers: usize) -> Self {
        let n = u8::try_from(num_peers.clamp(1, usize::from(u8::MAX))).unwrap_or(u8::MAX);
        match self {
            Self::Place { peer, label, x } => Self::Place { peer: peer % n, label, x },
            Self::Share { peer } => Self::Share { peer: peer % n },
            Self::Deliver { peer } => Self::Deliver { peer: peer % n },
            Self::CompleteSwap { peer } => Self::CompleteSwap { peer: peer % n },
            Self::Frame { peer } => Self::Frame { peer: peer % n },
            Self::Reset { peer, confirmed } => Self::Reset { peer: peer % n, confirmed },
            Self::Garbage { peer, seed } => Self::Garbage { peer: peer % n, seed },
            Self::Unknown { peer, kind } => Self::Unknown { peer: peer % n, kind },
        }
    }
}

/// Small label for testing.
///
/// Always non-empty. The text is deterministic from the seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub struct SmallLabel {
    /// Label seed.
    pub seed: u8,
}

impl SmallLabel {
    /// Expand to label text.
    pub fn text(self) -> String {
        const WORDS: [&str; 8] =
            ["You are loved", "Be kind", "Breathe", "You matter", "Keep going", "Smile", "Rest", "Hi"];
        format!("{} #{}", WORDS[usize::from(self.seed) % WORDS.len()], self.seed)
    }
}

/// Result of applying an operation.
///
/// Used to compare model and real system behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded.
    Ok,

    /// Operation failed with expected error.
    Error(OperationError),
}

/// Expected errors that can occur during operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// No map to share yet.
    MapUnavailable,

    /// Payload could not be decoded.
    Malformed,

    /// Payload kind is unknown.
    Unrecognized,

    /// Inbox empty or no swap in flight.
    NothingPending,

    /// Any other controller error.
    Other,
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, OperationResult::Ok)
    }

    /// Check if operation failed.
    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }
}
