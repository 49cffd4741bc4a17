//! Affirm wire format.
//!
//! Serialized payloads exchanged between peers sharing an AR world: a
//! snapshot of the shared coordinate frame ([`WorldMap`]) or a single placed
//! label ([`Anchor`]). Both travel inside a self-describing CBOR envelope so a
//! receiver can classify any payload without prior context.
//!
//! # Components
//!
//! - [`SyncMessage`]: Tagged union of the two payload kinds
//! - [`Decoded`]: Classification of inbound bytes
//! - [`Transform`]: Row-major 4x4 pose

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod message;
pub mod payloads;
pub mod transform;

pub use error::ProtocolError;
pub use message::{Decoded, MAX_MESSAGE_SIZE, MessageKind, PROTOCOL_VERSION, SyncMessage};
pub use payloads::{anchor::Anchor, world_map::WorldMap};
pub use transform::{TRANSFORM_LEN, Transform};
