//! Session error types.

use std::fmt;

use crate::tracking::TrackingError;

/// Errors that can occur in the session runtime.
#[derive(Debug)]
pub enum SessionError {
    /// The device cannot run world tracking. The session never starts.
    TrackingUnsupported,

    /// Tracking subsystem error
    Tracking(TrackingError),

    /// The session loop has stopped
    Closed,

    /// Configuration error
    Config(String),
}

impl SessionError {
    /// Returns true if the session cannot continue.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::TrackingUnsupported | Self::Config(_) => true,
            Self::Tracking(_) | Self::Closed => false,
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrackingUnsupported => write!(f, "world tracking is not supported on this device"),
            Self::Tracking(err) => write!(f, "tracking error: {err}"),
            Self::Closed => write!(f, "session closed"),
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tracking(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TrackingError> for SessionError {
    fn from(err: TrackingError) -> Self {
        match err {
            TrackingError::Unsupported => Self::TrackingUnsupported,
            other => Self::Tracking(other),
        }
    }
}
