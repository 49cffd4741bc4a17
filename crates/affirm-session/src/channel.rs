//! Peer-to-peer broadcast channel seam.

use affirm_core::Peer;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Callback invoked for every payload a peer sends us.
///
/// Handlers run on the channel's delivery context and must not block. The
/// session only forwards `(bytes, peer)` into its event queue.
pub type ReceiveHandler = Box<dyn Fn(Bytes, Peer) + Send + Sync>;

/// Errors from the peer channel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Sending to a peer failed.
    #[error("send to {peer} failed: {reason}")]
    SendFailed {
        /// Recipient.
        peer: Peer,
        /// Transport message.
        reason: String,
    },

    /// The channel was shut down.
    #[error("channel closed")]
    Closed,
}

/// Reliable multicast to every connected peer.
///
/// Discovery, invitation and connection management live behind this trait.
/// Implementations deliver payloads from one sender in the order they were
/// sent.
#[async_trait]
pub trait PeerChannel: Send + Sync {
    /// Identity of this device on the channel.
    fn local_peer(&self) -> Peer;

    /// Peers connected right now. Queried, never cached.
    fn current_peers(&self) -> Vec<Peer>;

    /// Send `payload` to every connected peer. Succeeds trivially when no
    /// peer is connected.
    async fn broadcast(&self, payload: Bytes) -> Result<(), ChannelError>;

    /// Install the receive handler, replacing any previous one.
    fn on_receive(&self, handler: ReceiveHandler);
}
