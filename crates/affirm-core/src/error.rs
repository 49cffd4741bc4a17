//! Controller error types.

use thiserror::Error;

use crate::peer::Peer;

/// Errors from synchronization operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A locally built message could not be encoded.
    ///
    /// The data model is always encodable, so this is an internal invariant
    /// violation.
    #[error("serialization failed: {reason}")]
    Serialization {
        /// Encoder message.
        reason: String,
    },

    /// Inbound bytes were malformed. The payload was dropped.
    #[error("undecodable payload from {peer} ({len} bytes): {reason}")]
    Decode {
        /// Sender.
        peer: Peer,
        /// Payload length in bytes.
        len: usize,
        /// Decoder message.
        reason: String,
    },

    /// Inbound payload was well formed but of an unknown kind. The payload
    /// was dropped.
    #[error("unrecognized payload kind {kind} from {peer} ({len} bytes)")]
    UnrecognizedPayload {
        /// Sender.
        peer: Peer,
        /// Payload length in bytes.
        len: usize,
        /// Wire kind.
        kind: u16,
    },

    /// No map snapshot is available to share yet.
    #[error("map unavailable: {reason}")]
    MapUnavailable {
        /// Why the snapshot could not be produced.
        reason: String,
    },

    /// A local placement was rejected (empty label or non-finite pose).
    #[error("invalid anchor: {reason}")]
    InvalidAnchor {
        /// Which invariant failed.
        reason: String,
    },

    /// The session is in the wrong state for the operation.
    #[error("invalid state: {reason}")]
    InvalidState {
        /// Description of the state error.
        reason: String,
    },
}

impl SyncError {
    /// Returns true if this error is fatal (unrecoverable).
    ///
    /// Network and decode errors never are; the session keeps processing.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Serialization { .. } => true,

            Self::Decode { .. }
            | Self::UnrecognizedPayload { .. }
            | Self::MapUnavailable { .. }
            | Self::InvalidAnchor { .. }
            | Self::InvalidState { .. } => false,
        }
    }

    /// Returns true if the user can do something about this error and should
    /// be told.
    pub fn is_user_actionable(&self) -> bool {
        matches!(self, Self::MapUnavailable { .. })
    }
}
