//! Status line data for the UI layer.

use crate::{
    event::InboundStats,
    peer::Peer,
    tracking::{LimitedReason, MappingStatus, TrackingState},
};

/// Point-in-time view of the session for status rendering.
///
/// Peer membership is supplied by the caller at query time and is never
/// cached by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Number of currently connected peers.
    pub connected_peers: usize,
    /// Display names of connected peers.
    pub peer_names: Vec<String>,
    /// Peer whose map backs the session.
    pub map_provider: Option<Peer>,
    /// Tracking quality.
    pub tracking: TrackingState,
    /// Map coverage.
    pub mapping: MappingStatus,
    /// Anchors currently held.
    pub anchor_count: usize,
    /// Label waiting to be placed.
    pub selected_label: Option<String>,
    /// Transient notice (interruption, failure, map unavailable).
    pub notice: Option<String>,
    /// Inbound payload counters.
    pub inbound: InboundStats,
}

impl SessionStatus {
    /// Text for the status line. Empty means hide the status view.
    pub fn message(&self) -> String {
        if let Some(notice) = &self.notice {
            return notice.clone();
        }

        let provider = self.map_provider.as_ref().map(|p| p.display_name.as_str());
        let has_label = self.selected_label.as_deref().is_some_and(|l| !l.is_empty());

        match self.tracking {
            TrackingState::Normal if self.anchor_count == 0 && self.peer_names.is_empty() => {
                "Move around to map the environment, or wait to join a shared session.".to_string()
            },
            TrackingState::Normal if !self.peer_names.is_empty() && provider.is_none() => {
                format!("Connected with {}.", self.peer_names.join(", "))
            },
            TrackingState::NotAvailable => "Tracking unavailable.".to_string(),
            TrackingState::Limited(LimitedReason::ExcessiveMotion) => {
                "Tracking limited - Move the device more slowly.".to_string()
            },
            TrackingState::Limited(LimitedReason::InsufficientFeatures) => {
                "Tracking limited - Point the device at an area with visible surface detail, or \
                 improve lighting conditions."
                    .to_string()
            },
            TrackingState::Limited(LimitedReason::Initializing | LimitedReason::Relocalizing)
                if provider.is_some() =>
            {
                format!("Received map from {}.", provider.unwrap_or_default())
            },
            TrackingState::Limited(LimitedReason::Relocalizing) => {
                "Resuming session - move to where you were when the session was interrupted."
                    .to_string()
            },
            TrackingState::Limited(LimitedReason::Initializing) => {
                "Initializing AR session.".to_string()
            },
            TrackingState::Normal if has_label => {
                "Tap where you'd like to place your affirmation.".to_string()
            },
            TrackingState::Normal => String::new(),
        }
    }
}
