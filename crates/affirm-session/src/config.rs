//! Session configuration.

use crate::{executor::BroadcastPolicy, tracking::PlaneDetection};

/// Longest display name a peer may advertise, in UTF-8 bytes.
pub const MAX_DISPLAY_NAME_LEN: usize = 63;

/// Configuration for one local session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Name other peers see.
    pub display_name: String,
    /// How failed broadcasts are handled.
    pub broadcast_policy: BroadcastPolicy,
    /// Surfaces to detect for placement.
    pub plane_detection: PlaneDetection,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            display_name: "Affirm".to_string(),
            broadcast_policy: BroadcastPolicy::default(),
            plane_detection: PlaneDetection::default(),
        }
    }
}

impl SessionConfig {
    /// Check the configuration before a session starts.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.display_name.is_empty() {
            return Err("display name must not be empty".to_string());
        }
        if self.display_name.len() > MAX_DISPLAY_NAME_LEN {
            return Err(format!(
                "display name is {} bytes, at most {MAX_DISPLAY_NAME_LEN} allowed",
                self.display_name.len()
            ));
        }
        if let BroadcastPolicy::Retry { max_attempts: 0, .. } = self.broadcast_policy {
            return Err("retry policy needs at least one attempt".to_string());
        }
        Ok(())
    }
}
