//! Tracking subsystem inputs.
//!
//! The camera/tracking subsystem is external. These types carry what it
//! reports into the controller: how well the environment is mapped and how
//! well the device is tracking.

/// How much of the environment the local session has mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MappingStatus {
    /// No map exists yet. Sharing and placement are disabled.
    #[default]
    NotAvailable,
    /// Mapped areas are sparse.
    Limited,
    /// Mapping is extending into newly visited areas.
    Extending,
    /// The visible area is well mapped.
    Mapped,
}

impl MappingStatus {
    /// True if a snapshot of the map can be captured.
    pub const fn is_available(self) -> bool {
        !matches!(self, Self::NotAvailable)
    }
}

/// Why tracking is degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitedReason {
    /// Session just started.
    Initializing,
    /// Relocalizing against a map after an interruption or map swap.
    Relocalizing,
    /// Device moving too fast.
    ExcessiveMotion,
    /// Not enough visible surface detail.
    InsufficientFeatures,
}

/// Device tracking quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    /// Position is unknown.
    #[default]
    NotAvailable,
    /// Position is known with reduced accuracy.
    Limited(LimitedReason),
    /// Tracking normally.
    Normal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_availability() {
        assert!(!MappingStatus::NotAvailable.is_available());
        assert!(MappingStatus::Limited.is_available());
        assert!(MappingStatus::Extending.is_available());
        assert!(MappingStatus::Mapped.is_available());
    }
}
