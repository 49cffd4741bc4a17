//! Placed label payload.

use serde::{Deserialize, Serialize};

use crate::{error::ProtocolError, transform::Transform};

/// A named, fixed pose in the shared coordinate frame.
///
/// Anchors are immutable once created. They are only ever added, or cleared
/// all at once by a session reset.
///
/// # Invariants
///
/// - `label` is non-empty
/// - `transform` is finite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// User-visible text.
    pub label: String,
    /// Pose in the shared coordinate frame.
    pub transform: Transform,
}

impl Anchor {
    /// Create an anchor, checking its invariants.
    pub fn new(label: impl Into<String>, transform: Transform) -> Result<Self, ProtocolError> {
        let anchor = Self { label: label.into(), transform };
        anchor.validate()?;
        Ok(anchor)
    }

    /// Check the anchor invariants.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.label.is_empty() {
            return Err(ProtocolError::InvalidAnchor { reason: "empty label" });
        }
        if !self.transform.is_finite() {
            return Err(ProtocolError::InvalidAnchor { reason: "non-finite transform" });
        }
        Ok(())
    }
}
