//! Shared coordinate frame snapshot payload.

use serde::{Deserialize, Serialize};

use crate::{error::ProtocolError, payloads::anchor::Anchor};

/// Snapshot of the shared coordinate reference frame.
///
/// `data` is produced and consumed only by the tracking subsystem; the
/// protocol treats it as an atomic blob. `anchors` are the labels the
/// producing device knew about at capture time, so a peer adopting the map
/// also catches up on everything placed before it joined.
///
/// # Security
///
/// - **Debug Redaction**: The `Debug` impl prints only the size of `data`.
///   Map blobs can be megabytes of feature points and should never end up in
///   logs verbatim.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldMap {
    /// Opaque tracking-subsystem data.
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    /// Anchors known at capture time.
    #[serde(default)]
    pub anchors: Vec<Anchor>,
}

impl WorldMap {
    /// Create a map snapshot.
    pub fn new(data: Vec<u8>, anchors: Vec<Anchor>) -> Self {
        Self { data, anchors }
    }

    /// Check every embedded anchor.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        self.anchors.iter().try_for_each(Anchor::validate)
    }
}

impl std::fmt::Debug for WorldMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldMap")
            .field("data", &format!("<{} bytes>", self.data.len()))
            .field("anchors", &self.anchors)
            .finish()
    }
}
