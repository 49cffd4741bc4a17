//! Explicit per-session state owned by the controller.

use std::{
    collections::{HashMap, VecDeque},
    time::Instant,
};

use affirm_proto::{Anchor, WorldMap};

use crate::{
    event::InboundStats,
    peer::Peer,
    tracking::{MappingStatus, TrackingState},
};

/// Where the current base coordinate frame came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapOrigin {
    /// Tracking runs but nothing has been mapped yet.
    NoMap,
    /// The local device mapped the environment itself.
    Local,
    /// Adopted from a peer's shared map.
    Peer(Peer),
}

/// Lifecycle phase of the local session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Tracking has not started.
    Uninitialized,
    /// Tracking is running against a base map.
    Tracking(MapOrigin),
}

/// Work held back until the base map is stable.
#[derive(Debug, Clone)]
pub(crate) enum Deferred {
    /// Inbound map to swap in.
    Map { map: WorldMap, from: Peer },
    /// Anchor to insert (inbound or locally placed).
    Anchor(Anchor),
}

/// A base-map swap handed to the tracking subsystem.
#[derive(Debug, Clone)]
pub(crate) struct InFlightSwap {
    pub(crate) swap: u64,
    pub(crate) provider: Peer,
    /// Anchors the adopted map carries, inserted once the swap completes.
    pub(crate) anchors: Vec<Anchor>,
}

/// All mutable session state, in one place.
///
/// Only [`SyncController`](crate::SyncController) mutates it.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub(crate) phase: SessionPhase,
    pub(crate) selected_label: Option<String>,
    pub(crate) mapping: MappingStatus,
    pub(crate) tracking: TrackingState,
    pub(crate) notice: Option<String>,
    pub(crate) swap_in_flight: Option<InFlightSwap>,
    pub(crate) backlog: VecDeque<Deferred>,
    pub(crate) pending_snapshots: HashMap<u64, Instant>,
    pub(crate) inbound: InboundStats,
    pub(crate) provider_since: Option<Instant>,
    pub(crate) next_swap: u64,
    pub(crate) next_request: u64,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            selected_label: None,
            mapping: MappingStatus::NotAvailable,
            tracking: TrackingState::NotAvailable,
            notice: None,
            swap_in_flight: None,
            backlog: VecDeque::new(),
            pending_snapshots: HashMap::new(),
            inbound: InboundStats::default(),
            provider_since: None,
            next_swap: 0,
            next_request: 0,
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    /// Peer whose map backs the session, if any.
    pub fn map_provider(&self) -> Option<&Peer> {
        match &self.phase {
            SessionPhase::Tracking(MapOrigin::Peer(peer)) => Some(peer),
            _ => None,
        }
    }

    /// When the current peer map was adopted.
    pub fn provider_since(&self) -> Option<Instant> {
        self.provider_since
    }

    /// Label waiting to be placed.
    pub fn selected_label(&self) -> Option<&str> {
        self.selected_label.as_deref()
    }

    /// Last reported map coverage.
    pub fn mapping(&self) -> MappingStatus {
        self.mapping
    }

    /// Last reported tracking quality.
    pub fn tracking(&self) -> TrackingState {
        self.tracking
    }

    /// Transient message for the status line.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// True while the tracking subsystem is re-initializing against a map.
    pub fn is_swapping(&self) -> bool {
        self.swap_in_flight.is_some()
    }

    /// Number of inbound or local items waiting for a swap to finish.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Inbound payload classification counters.
    pub fn inbound(&self) -> InboundStats {
        self.inbound
    }
}
