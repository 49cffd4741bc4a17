//! Wire format errors.

use thiserror::Error;

/// Errors from encoding or decoding [`SyncMessage`](crate::SyncMessage)s.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// CBOR serialization failed.
    #[error("encode failed: {reason}")]
    Encode {
        /// Underlying serializer message.
        reason: String,
    },

    /// Bytes are not a well-formed CBOR envelope.
    #[error("decode failed: {reason}")]
    Decode {
        /// Underlying deserializer message.
        reason: String,
    },

    /// Envelope parsed but its body does not match the declared kind.
    #[error("invalid {kind} body: {reason}")]
    InvalidBody {
        /// Declared message kind.
        kind: &'static str,
        /// What did not match.
        reason: String,
    },

    /// Anchor violates its invariants (empty label or non-finite pose).
    #[error("invalid anchor: {reason}")]
    InvalidAnchor {
        /// Which invariant failed.
        reason: &'static str,
    },

    /// Payload exceeds [`MAX_MESSAGE_SIZE`](crate::MAX_MESSAGE_SIZE).
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Actual size in bytes.
        size: usize,
        /// Configured maximum.
        max: usize,
    },
}
