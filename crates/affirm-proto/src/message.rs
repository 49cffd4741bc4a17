//! Self-describing sync message envelope.
//!
//! Every payload on the wire is a CBOR map:
//!
//! ```text
//! { version: u8, kind: u16, body: <kind-specific CBOR value> }
//! ```
//!
//! The receiver classifies a payload from `kind` alone. Unknown kinds are
//! reported as [`Decoded::Unrecognized`] rather than an error, so older peers
//! tolerate message kinds added later.

use bytes::Bytes;
use ciborium::Value;
use serde::{Deserialize, Serialize};

use crate::{
    error::ProtocolError,
    payloads::{anchor::Anchor, world_map::WorldMap},
};

/// Envelope version written by this implementation.
pub const PROTOCOL_VERSION: u8 = 1;

/// Largest encoded message accepted or produced (16 MiB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Message kinds known to this implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageKind {
    /// Shared coordinate frame snapshot.
    WorldMap = 1,
    /// Single placed label.
    Anchor = 2,
}

impl MessageKind {
    /// Parse a wire kind. `None` for kinds this build does not know.
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::WorldMap),
            2 => Some(Self::Anchor),
            _ => None,
        }
    }

    /// Wire value.
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Human-readable name for logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::WorldMap => "world_map",
            Self::Anchor => "anchor",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u8,
    kind: u16,
    body: Value,
}

/// A synchronization message exchanged between peers.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncMessage {
    /// Replace the receiver's base coordinate frame.
    WorldMap(WorldMap),
    /// Add one label to the receiver's world.
    Anchor(Anchor),
}

/// Result of classifying an inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A message this build understands.
    Message(SyncMessage),
    /// Well-formed envelope carrying a kind this build does not know.
    Unrecognized {
        /// Wire kind.
        kind: u16,
        /// Envelope version the sender wrote.
        version: u8,
    },
}

impl SyncMessage {
    /// Kind tag written into the envelope.
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::WorldMap(_) => MessageKind::WorldMap,
            Self::Anchor(_) => MessageKind::Anchor,
        }
    }

    /// Encode into a self-describing CBOR envelope.
    ///
    /// # Errors
    ///
    /// - `InvalidAnchor` if the message carries an anchor violating its
    ///   invariants
    /// - `Encode` if CBOR serialization fails
    /// - `PayloadTooLarge` if the result exceeds [`MAX_MESSAGE_SIZE`]
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let body = match self {
            Self::WorldMap(map) => {
                map.validate()?;
                Value::serialized(map)
            },
            Self::Anchor(anchor) => {
                anchor.validate()?;
                Value::serialized(anchor)
            },
        }
        .map_err(|e| ProtocolError::Encode { reason: e.to_string() })?;

        let envelope = Envelope { version: PROTOCOL_VERSION, kind: self.kind().to_u16(), body };

        let mut buf = Vec::new();
        ciborium::ser::into_writer(&envelope, &mut buf)
            .map_err(|e| ProtocolError::Encode { reason: e.to_string() })?;

        if buf.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::PayloadTooLarge { size: buf.len(), max: MAX_MESSAGE_SIZE });
        }

        Ok(Bytes::from(buf))
    }

    /// Decode and classify an inbound payload.
    ///
    /// Never panics on arbitrary input.
    ///
    /// # Errors
    ///
    /// - `PayloadTooLarge` before any parsing if `bytes` is oversized
    /// - `Decode` if `bytes` is not a CBOR envelope
    /// - `InvalidBody` if the body does not match its declared kind
    /// - `InvalidAnchor` if a decoded anchor violates its invariants
    pub fn decode(bytes: &[u8]) -> Result<Decoded, ProtocolError> {
        if bytes.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::PayloadTooLarge { size: bytes.len(), max: MAX_MESSAGE_SIZE });
        }

        let envelope: Envelope = ciborium::de::from_reader(bytes)
            .map_err(|e| ProtocolError::Decode { reason: e.to_string() })?;

        let Some(kind) = MessageKind::from_u16(envelope.kind) else {
            return Ok(Decoded::Unrecognized { kind: envelope.kind, version: envelope.version });
        };

        let message = match kind {
            MessageKind::WorldMap => {
                let map: WorldMap = envelope.body.deserialized().map_err(|e| {
                    ProtocolError::InvalidBody { kind: kind.name(), reason: e.to_string() }
                })?;
                map.validate()?;
                Self::WorldMap(map)
            },
            MessageKind::Anchor => {
                let anchor: Anchor = envelope.body.deserialized().map_err(|e| {
                    ProtocolError::InvalidBody { kind: kind.name(), reason: e.to_string() }
                })?;
                anchor.validate()?;
                Self::Anchor(anchor)
            },
        };

        Ok(Decoded::Message(message))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::transform::Transform;

    fn encode_raw(version: u8, kind: u16, body: Value) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&Envelope { version, kind, body }, &mut buf).expect("encode");
        buf
    }

    #[test]
    fn kind_from_u16() {
        assert_eq!(MessageKind::from_u16(1), Some(MessageKind::WorldMap));
        assert_eq!(MessageKind::from_u16(2), Some(MessageKind::Anchor));
        assert_eq!(MessageKind::from_u16(0), None);
        assert_eq!(MessageKind::from_u16(999), None);
    }

    #[test]
    fn anchor_roundtrip() {
        let anchor = Anchor::new("You are loved", Transform::translation(0.1, -0.2, 0.3))
            .expect("valid anchor");
        let bytes = SyncMessage::Anchor(anchor.clone()).encode().expect("encode");

        let decoded = SyncMessage::decode(&bytes).expect("decode");
        assert_eq!(decoded, Decoded::Message(SyncMessage::Anchor(anchor)));
    }

    #[test]
    fn world_map_roundtrip_keeps_anchors() {
        let anchor = Anchor::new("Be kind", Transform::IDENTITY).expect("valid anchor");
        let map = WorldMap::new(vec![0xde, 0xad, 0xbe, 0xef], vec![anchor]);
        let bytes = SyncMessage::WorldMap(map.clone()).encode().expect("encode");

        let decoded = SyncMessage::decode(&bytes).expect("decode");
        assert_eq!(decoded, Decoded::Message(SyncMessage::WorldMap(map)));
    }

    #[test]
    fn unknown_kind_is_unrecognized() {
        let bytes = encode_raw(2, 77, Value::Text("reset".to_string()));

        let decoded = SyncMessage::decode(&bytes).expect("decode");
        assert_eq!(decoded, Decoded::Unrecognized { kind: 77, version: 2 });
    }

    #[test]
    fn garbage_is_decode_error() {
        let result = SyncMessage::decode(&[0xff, 0x00, 0x13, 0x37]);
        assert!(matches!(result, Err(ProtocolError::Decode { .. })));
    }

    #[test]
    fn empty_payload_is_decode_error() {
        assert!(matches!(SyncMessage::decode(&[]), Err(ProtocolError::Decode { .. })));
    }

    #[test]
    fn body_mismatch_is_invalid_body() {
        let bytes = encode_raw(PROTOCOL_VERSION, MessageKind::Anchor.to_u16(), Value::Integer(5.into()));

        let result = SyncMessage::decode(&bytes);
        assert!(matches!(result, Err(ProtocolError::InvalidBody { kind: "anchor", .. })));
    }

    #[test]
    fn decoded_empty_label_rejected() {
        let bad = Anchor { label: String::new(), transform: Transform::IDENTITY };
        let body = Value::serialized(&bad).expect("value");
        let bytes = encode_raw(PROTOCOL_VERSION, MessageKind::Anchor.to_u16(), body);

        let result = SyncMessage::decode(&bytes);
        assert!(matches!(result, Err(ProtocolError::InvalidAnchor { .. })));
    }

    #[test]
    fn encode_rejects_invalid_anchor() {
        let bad = Anchor { label: String::new(), transform: Transform::IDENTITY };
        assert!(SyncMessage::Anchor(bad).encode().is_err());
    }

    #[test]
    fn oversized_input_rejected_before_parsing() {
        let bytes = vec![0u8; MAX_MESSAGE_SIZE + 1];
        assert!(matches!(
            SyncMessage::decode(&bytes),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_anchor_roundtrip(
            label in "[a-zA-Z0-9 !']{1,48}",
            values in prop::array::uniform16(-1.0e6f64..1.0e6),
        ) {
            let anchor = Anchor::new(label, Transform::from_row_major(values)).expect("valid");
            let bytes = SyncMessage::Anchor(anchor.clone()).encode().expect("encode");
            prop_assert_eq!(
                SyncMessage::decode(&bytes).expect("decode"),
                Decoded::Message(SyncMessage::Anchor(anchor))
            );
        }

        #[test]
        fn prop_world_map_roundtrip(data in prop::collection::vec(any::<u8>(), 0..512)) {
            let map = WorldMap::new(data, vec![]);
            let bytes = SyncMessage::WorldMap(map.clone()).encode().expect("encode");
            prop_assert_eq!(
                SyncMessage::decode(&bytes).expect("decode"),
                Decoded::Message(SyncMessage::WorldMap(map))
            );
        }

        #[test]
        fn prop_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = SyncMessage::decode(&bytes);
        }
    }
}
