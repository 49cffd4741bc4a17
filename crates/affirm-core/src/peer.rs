//! Peer identity.

use std::fmt;

/// Network-assigned identity of a participating device.
///
/// Stable for the lifetime of a connection and unique within a session. The
/// controller only uses it as a lookup key (who sent this, who supplied the
/// current map).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Peer {
    /// Transport-assigned unique identifier.
    pub id: u64,
    /// Name shown in the status line.
    pub display_name: String,
}

impl Peer {
    /// Create a peer identity.
    pub fn new(id: u64, display_name: impl Into<String>) -> Self {
        Self { id, display_name: display_name.into() }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{:016x}", self.display_name, self.id)
    }
}
