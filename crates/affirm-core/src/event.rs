//! Events fed into the controller and actions it produces.

use affirm_proto::{Anchor, MessageKind, Transform, WorldMap};
use bytes::Bytes;

use crate::{
    peer::Peer,
    tracking::{MappingStatus, TrackingState},
};

/// Input to [`SyncController::handle`](crate::SyncController::handle).
///
/// Local user intents, tracking-subsystem callbacks, and inbound network
/// payloads all arrive as events so they are applied in one order.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The local tracking session started running.
    SessionStarted,

    /// A new camera frame was processed.
    FrameUpdated {
        /// Current map coverage.
        mapping: MappingStatus,
        /// Current tracking quality.
        tracking: TrackingState,
    },

    /// Tracking was interrupted (app backgrounded, camera lost).
    SessionInterrupted,

    /// Tracking resumed after an interruption.
    InterruptionEnded,

    /// The tracking session failed.
    SessionFailed {
        /// Failure description shown to the user.
        reason: String,
    },

    /// The user picked a label to place.
    SelectLabel {
        /// Chosen label.
        label: String,
    },

    /// The user tapped a surface; places the selected label there.
    SurfaceTapped {
        /// Pose of the hit surface.
        transform: Transform,
    },

    /// Place a label at a pose and share it.
    PlaceAnchor {
        /// Label text. Empty means nothing to place.
        label: String,
        /// Pose in the shared coordinate frame.
        transform: Transform,
    },

    /// Share the current map with all peers.
    ShareMap,

    /// A snapshot requested via [`SyncAction::RequestSnapshot`] completed.
    SnapshotReady {
        /// Request identifier.
        request: u64,
        /// Snapshot, or why none could be captured.
        result: Result<WorldMap, String>,
    },

    /// A peer sent us a payload.
    DataReceived {
        /// Raw payload.
        bytes: Bytes,
        /// Sender.
        from: Peer,
    },

    /// The tracking subsystem finished re-initializing against a map
    /// requested via [`SyncAction::ApplyBaseMap`].
    BaseMapApplied {
        /// Swap identifier.
        swap: u64,
    },

    /// The tracking subsystem could not re-initialize against the map. The
    /// map is not adopted.
    BaseMapFailed {
        /// Swap identifier.
        swap: u64,
        /// Why.
        reason: String,
    },

    /// Clear the world. Ignored unless `confirmed`.
    ResetWorld {
        /// The user confirmed the destructive reset.
        confirmed: bool,
    },
}

/// Output of the controller. The caller performs the I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    /// Send an encoded message to every connected peer.
    Broadcast {
        /// Kind of the encoded message.
        kind: MessageKind,
        /// Encoded envelope.
        payload: Bytes,
    },

    /// Ask the tracking subsystem for a snapshot of the current map.
    ///
    /// Answer with [`SyncEvent::SnapshotReady`] carrying the same `request`.
    RequestSnapshot {
        /// Request identifier.
        request: u64,
    },

    /// Destructively re-initialize tracking against `map`.
    ///
    /// Answer with [`SyncEvent::BaseMapApplied`], or [`SyncEvent::BaseMapFailed`]
    /// if the map cannot be applied, carrying the same `swap`.
    ApplyBaseMap {
        /// Swap identifier.
        swap: u64,
        /// Map to adopt.
        map: WorldMap,
    },

    /// Re-initialize tracking from scratch with no map.
    ResetTracking,

    /// An anchor was added to the store. Render it and register it with the
    /// tracking session.
    AnchorAdded(Anchor),

    /// Every anchor was removed from the store.
    AnchorsCleared,
}

/// Counters for inbound payload classification.
///
/// Every inbound payload increments exactly one counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboundStats {
    /// Payloads classified as world maps.
    pub maps: u64,
    /// Payloads classified as anchors.
    pub anchors: u64,
    /// Well-formed payloads of an unknown kind.
    pub unrecognized: u64,
    /// Malformed payloads.
    pub malformed: u64,
}

impl InboundStats {
    /// Total payloads classified.
    pub const fn total(&self) -> u64 {
        self.maps + self.anchors + self.unrecognized + self.malformed
    }
}
