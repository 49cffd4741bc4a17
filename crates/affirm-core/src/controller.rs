//! Synchronization controller.
//!
//! The `SyncController` is the protocol core. It turns local user intents and
//! inbound peer payloads into store mutations and outbound broadcasts, and
//! tracks which peer supplied the current base map.
//!
//! # Ordering
//!
//! At most one base-map swap is in flight. While the tracking subsystem
//! re-initializes, every inbound map, inbound anchor and local anchor
//! insertion is queued in arrival order and replayed when the swap
//! completes. A queued map starts the next swap, so the last map applied
//! wins.

use affirm_proto::{Anchor, Decoded, MessageKind, ProtocolError, SyncMessage, Transform, WorldMap};
use bytes::Bytes;

use crate::{
    env::Environment,
    error::SyncError,
    event::{SyncAction, SyncEvent},
    peer::Peer,
    state::{Deferred, InFlightSwap, MapOrigin, SessionPhase, SessionState},
    status::SessionStatus,
    store::WorldStateStore,
    tracking::{MappingStatus, TrackingState},
};

/// Synchronization state machine.
///
/// Pure state machine - returns actions, caller handles I/O.
///
/// # Type Parameters
///
/// - `E`: Environment implementation for time
pub struct SyncController<E: Environment> {
    /// Session state (phase, provider, selection, pending work).
    state: SessionState,

    /// Anchors currently displayed.
    store: WorldStateStore,

    /// Environment for time.
    env: E,
}

impl<E: Environment> SyncController<E> {
    /// Create a controller for a session that has not started yet.
    pub fn new(env: E) -> Self {
        Self { state: SessionState::new(), store: WorldStateStore::new(), env }
    }

    /// Session state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Anchors currently held.
    pub fn store(&self) -> &WorldStateStore {
        &self.store
    }

    /// Peer whose map backs the session, if any.
    pub fn map_provider(&self) -> Option<&Peer> {
        self.state.map_provider()
    }

    /// True if a tap would place an anchor on a mapped surface.
    pub fn can_place_anchor(&self) -> bool {
        matches!(self.state.phase, SessionPhase::Tracking(_)) && self.state.mapping.is_available()
    }

    /// Status snapshot against the caller's current peer list.
    pub fn status(&self, peers: &[Peer]) -> SessionStatus {
        SessionStatus {
            connected_peers: peers.len(),
            peer_names: peers.iter().map(|p| p.display_name.clone()).collect(),
            map_provider: self.map_provider().cloned(),
            tracking: self.state.tracking,
            mapping: self.state.mapping,
            anchor_count: self.store.len(),
            selected_label: self.state.selected_label.clone(),
            notice: self.state.notice.clone(),
            inbound: self.state.inbound,
        }
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if the event cannot be processed. Only
    /// [`SyncError::is_fatal`] errors indicate a bug; everything else is
    /// logged by the caller and processing continues.
    pub fn handle(&mut self, event: SyncEvent) -> Result<Vec<SyncAction>, SyncError> {
        match event {
            SyncEvent::SessionStarted => Ok(self.handle_session_started()),
            SyncEvent::FrameUpdated { mapping, tracking } => {
                self.handle_frame_updated(mapping, tracking);
                Ok(vec![])
            },
            SyncEvent::SessionInterrupted => {
                self.state.notice = Some("Session was interrupted".to_string());
                Ok(vec![])
            },
            SyncEvent::InterruptionEnded => {
                self.state.notice = Some("Session interruption ended".to_string());
                Ok(vec![])
            },
            SyncEvent::SessionFailed { reason } => {
                tracing::warn!(%reason, "tracking session failed");
                self.state.notice = Some(format!("Session failed: {reason}"));
                Ok(vec![])
            },
            SyncEvent::SelectLabel { label } => {
                self.select_label(label);
                Ok(vec![])
            },
            SyncEvent::SurfaceTapped { transform } => self.surface_tapped(transform),
            SyncEvent::PlaceAnchor { label, transform } => self.place_anchor(&label, transform),
            SyncEvent::ShareMap => self.share_current_map(),
            SyncEvent::SnapshotReady { request, result } => {
                self.handle_snapshot_ready(request, result)
            },
            SyncEvent::DataReceived { bytes, from } => self.handle_incoming(&bytes, &from),
            SyncEvent::BaseMapApplied { swap } => Ok(self.handle_base_map_applied(swap)),
            SyncEvent::BaseMapFailed { swap, reason } => {
                Ok(self.handle_base_map_failed(swap, &reason))
            },
            SyncEvent::ResetWorld { confirmed } => Ok(self.reset_world(confirmed)),
        }
    }

    /// Remember the label the next tap will place. Empty clears the
    /// selection.
    pub fn select_label(&mut self, label: String) {
        self.state.selected_label = if label.is_empty() { None } else { Some(label) };
    }

    /// Place the selected label at `transform`. No-op if nothing is selected.
    pub fn surface_tapped(&mut self, transform: Transform) -> Result<Vec<SyncAction>, SyncError> {
        match self.state.selected_label.clone() {
            Some(label) => self.place_anchor(&label, transform),
            None => Ok(vec![]),
        }
    }

    /// Place a labelled anchor locally and broadcast it.
    ///
    /// An empty label is a silent no-op. On success the anchor is in the
    /// store (or queued behind an in-flight map swap), exactly one
    /// `Broadcast` is returned, and the selected label is cleared.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if tracking has not started
    /// - `InvalidAnchor` if `transform` is not finite
    /// - `Serialization` if the anchor cannot be encoded
    pub fn place_anchor(
        &mut self,
        label: &str,
        transform: Transform,
    ) -> Result<Vec<SyncAction>, SyncError> {
        if label.is_empty() {
            tracing::debug!("no label selected, ignoring placement");
            return Ok(vec![]);
        }

        if self.state.phase == SessionPhase::Uninitialized {
            return Err(SyncError::InvalidState {
                reason: "cannot place an anchor before tracking starts".to_string(),
            });
        }

        let anchor = Anchor::new(label, transform)
            .map_err(|e| SyncError::InvalidAnchor { reason: e.to_string() })?;

        let payload = SyncMessage::Anchor(anchor.clone())
            .encode()
            .map_err(|e| SyncError::Serialization { reason: e.to_string() })?;

        self.state.selected_label = None;

        let mut actions = Vec::new();
        self.enqueue(Deferred::Anchor(anchor), &mut actions);
        actions.push(SyncAction::Broadcast { kind: MessageKind::Anchor, payload });

        tracing::debug!(%label, "placed anchor");
        Ok(actions)
    }

    /// Request a snapshot of the current map for sharing.
    ///
    /// The snapshot arrives later as [`SyncEvent::SnapshotReady`].
    ///
    /// # Errors
    ///
    /// `MapUnavailable` if tracking has not started or nothing has been
    /// mapped yet. No broadcast happens.
    pub fn share_current_map(&mut self) -> Result<Vec<SyncAction>, SyncError> {
        if self.state.phase == SessionPhase::Uninitialized {
            return Err(self.map_unavailable("tracking has not started".to_string()));
        }
        if !self.state.mapping.is_available() {
            return Err(self.map_unavailable("the environment has not been mapped yet".to_string()));
        }

        self.state.next_request += 1;
        let request = self.state.next_request;
        self.state.pending_snapshots.insert(request, self.env.now());

        tracing::debug!(request, "requesting map snapshot");
        Ok(vec![SyncAction::RequestSnapshot { request }])
    }

    /// Classify and apply an inbound payload.
    ///
    /// Every call ends in exactly one of: applied (or queued) as a map,
    /// applied (or queued) as an anchor, `UnrecognizedPayload`, or `Decode`.
    ///
    /// # Errors
    ///
    /// `Decode` for malformed bytes, `UnrecognizedPayload` for unknown kinds.
    /// Both are non-fatal and leave the state untouched apart from the
    /// inbound counters.
    pub fn handle_incoming(
        &mut self,
        bytes: &Bytes,
        from: &Peer,
    ) -> Result<Vec<SyncAction>, SyncError> {
        let len = bytes.len();

        let decoded = match SyncMessage::decode(bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.state.inbound.malformed += 1;
                tracing::warn!(peer = %from, len, error = %e, "dropping undecodable payload");
                return Err(SyncError::Decode { peer: from.clone(), len, reason: e.to_string() });
            },
        };

        let mut actions = Vec::new();
        match decoded {
            Decoded::Message(SyncMessage::WorldMap(map)) => {
                self.state.inbound.maps += 1;
                tracing::info!(peer = %from, len, anchors = map.anchors.len(), "received world map");
                self.enqueue(Deferred::Map { map, from: from.clone() }, &mut actions);
            },
            Decoded::Message(SyncMessage::Anchor(anchor)) => {
                self.state.inbound.anchors += 1;
                tracing::debug!(peer = %from, label = %anchor.label, "received anchor");
                self.enqueue(Deferred::Anchor(anchor), &mut actions);
            },
            Decoded::Unrecognized { kind, version } => {
                self.state.inbound.unrecognized += 1;
                tracing::warn!(peer = %from, len, kind, version, "dropping unrecognized payload");
                return Err(SyncError::UnrecognizedPayload { peer: from.clone(), len, kind });
            },
        }

        Ok(actions)
    }

    /// Clear the world and restart tracking from scratch.
    ///
    /// Ignored unless `confirmed`, and before tracking starts. Peers are not
    /// notified; each device resets independently.
    pub fn reset_world(&mut self, confirmed: bool) -> Vec<SyncAction> {
        if !confirmed {
            tracing::debug!("reset not confirmed, ignoring");
            return vec![];
        }
        if self.state.phase == SessionPhase::Uninitialized {
            tracing::debug!(
                buffered = self.state.backlog.len(),
                "nothing to reset before tracking starts"
            );
            return vec![];
        }

        let dropped = self.state.backlog.len();
        self.store.clear_all();
        self.state.backlog.clear();
        self.state.swap_in_flight = None;
        self.state.pending_snapshots.clear();
        self.state.phase = SessionPhase::Tracking(MapOrigin::NoMap);
        self.state.provider_since = None;
        self.state.mapping = MappingStatus::NotAvailable;
        self.state.notice = None;

        tracing::info!(dropped, "world reset locally");
        vec![SyncAction::AnchorsCleared, SyncAction::ResetTracking]
    }

    fn handle_session_started(&mut self) -> Vec<SyncAction> {
        if self.state.phase != SessionPhase::Uninitialized {
            tracing::debug!("session already running");
            return vec![];
        }

        self.state.phase = SessionPhase::Tracking(MapOrigin::NoMap);
        tracing::info!(buffered = self.state.backlog.len(), "tracking started");

        let mut actions = Vec::new();
        self.drain_backlog(&mut actions);
        actions
    }

    fn handle_frame_updated(&mut self, mapping: MappingStatus, tracking: TrackingState) {
        self.state.mapping = mapping;
        self.state.tracking = tracking;
        self.state.notice = None;

        if self.state.phase == SessionPhase::Tracking(MapOrigin::NoMap) && mapping.is_available() {
            self.state.phase = SessionPhase::Tracking(MapOrigin::Local);
            tracing::debug!("local map established");
        }
    }

    fn handle_snapshot_ready(
        &mut self,
        request: u64,
        result: Result<WorldMap, String>,
    ) -> Result<Vec<SyncAction>, SyncError> {
        let Some(requested_at) = self.state.pending_snapshots.remove(&request) else {
            tracing::debug!(request, "ignoring stale snapshot");
            return Ok(vec![]);
        };
        let elapsed = self.env.now().saturating_duration_since(requested_at);

        let map = result.map_err(|reason| self.map_unavailable(reason))?;
        let payload = match SyncMessage::WorldMap(map).encode() {
            Ok(payload) => payload,
            Err(ProtocolError::PayloadTooLarge { size, max }) => {
                return Err(self.map_unavailable(format!(
                    "map is too large to share ({size} bytes, limit {max})"
                )));
            },
            Err(e) => return Err(SyncError::Serialization { reason: e.to_string() }),
        };

        tracing::info!(request, len = payload.len(), ?elapsed, "sharing world map");
        Ok(vec![SyncAction::Broadcast { kind: MessageKind::WorldMap, payload }])
    }

    fn handle_base_map_applied(&mut self, swap: u64) -> Vec<SyncAction> {
        let in_flight = match self.state.swap_in_flight.take() {
            Some(in_flight) if in_flight.swap == swap => in_flight,
            other => {
                self.state.swap_in_flight = other;
                tracing::debug!(swap, "ignoring completion of superseded swap");
                return vec![];
            },
        };

        let mut actions = Vec::new();
        for anchor in in_flight.anchors {
            self.insert_anchor(anchor, &mut actions);
        }

        tracing::info!(swap, provider = %in_flight.provider, "base map applied");
        self.state.phase = SessionPhase::Tracking(MapOrigin::Peer(in_flight.provider));
        self.state.provider_since = Some(self.env.now());

        self.drain_backlog(&mut actions);
        actions
    }

    /// The sender's map never became the base map: no provider is recorded
    /// and its anchors are dropped. Tracking restarts fresh before queued
    /// work resumes.
    fn handle_base_map_failed(&mut self, swap: u64, reason: &str) -> Vec<SyncAction> {
        let in_flight = match self.state.swap_in_flight.take() {
            Some(in_flight) if in_flight.swap == swap => in_flight,
            other => {
                self.state.swap_in_flight = other;
                tracing::debug!(swap, "ignoring failure of superseded swap");
                return vec![];
            },
        };

        tracing::warn!(swap, provider = %in_flight.provider, %reason, "base map rejected");
        self.state.phase = SessionPhase::Tracking(MapOrigin::NoMap);
        self.state.provider_since = None;
        self.state.mapping = MappingStatus::NotAvailable;
        self.state.notice =
            Some(format!("Could not join map from {}: {reason}", in_flight.provider.display_name));

        let mut actions = vec![SyncAction::ResetTracking];
        self.drain_backlog(&mut actions);
        actions
    }

    /// Queue work behind any in-flight swap, then apply what can be applied.
    fn enqueue(&mut self, item: Deferred, actions: &mut Vec<SyncAction>) {
        self.state.backlog.push_back(item);
        self.drain_backlog(actions);
    }

    fn drain_backlog(&mut self, actions: &mut Vec<SyncAction>) {
        while !self.is_blocked() {
            let Some(item) = self.state.backlog.pop_front() else {
                break;
            };
            match item {
                Deferred::Map { map, from } => self.start_swap(map, from, actions),
                Deferred::Anchor(anchor) => self.insert_anchor(anchor, actions),
            }
        }

        if !self.state.backlog.is_empty() {
            tracing::debug!(queued = self.state.backlog.len(), "holding work until base map settles");
        }
    }

    fn is_blocked(&self) -> bool {
        self.state.phase == SessionPhase::Uninitialized || self.state.swap_in_flight.is_some()
    }

    fn start_swap(&mut self, map: WorldMap, from: Peer, actions: &mut Vec<SyncAction>) {
        self.state.next_swap += 1;
        let swap = self.state.next_swap;

        self.store.clear_all();
        actions.push(SyncAction::AnchorsCleared);

        let anchors = map.anchors.clone();
        self.state.swap_in_flight = Some(InFlightSwap { swap, provider: from, anchors });
        actions.push(SyncAction::ApplyBaseMap { swap, map });
    }

    fn insert_anchor(&mut self, anchor: Anchor, actions: &mut Vec<SyncAction>) {
        self.store.add_anchor(anchor.clone());
        actions.push(SyncAction::AnchorAdded(anchor));
    }

    fn map_unavailable(&mut self, reason: String) -> SyncError {
        tracing::warn!(%reason, "cannot share map");
        self.state.notice = Some(format!("Map unavailable: {reason}"));
        SyncError::MapUnavailable { reason }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::{
        future::Future,
        time::{Duration, Instant},
    };

    use proptest::prelude::*;

    use super::*;

    #[derive(Clone)]
    struct TestEnv;

    impl Environment for TestEnv {
        fn now(&self) -> Instant {
            Instant::now()
        }

        fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
            std::future::ready(())
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = i as u8;
            }
        }
    }

    fn peer(id: u64, name: &str) -> Peer {
        Peer::new(id, name)
    }

    fn anchor(label: &str, x: f64) -> Anchor {
        Anchor::new(label, Transform::translation(x, 0.0, 0.0)).unwrap()
    }

    fn encoded(message: SyncMessage) -> Bytes {
        message.encode().unwrap()
    }

    fn tracking_controller() -> SyncController<TestEnv> {
        let mut controller = SyncController::new(TestEnv);
        controller.handle(SyncEvent::SessionStarted).unwrap();
        controller
            .handle(SyncEvent::FrameUpdated {
                mapping: MappingStatus::Mapped,
                tracking: TrackingState::Normal,
            })
            .unwrap();
        controller
    }

    fn broadcasts(actions: &[SyncAction]) -> usize {
        actions.iter().filter(|a| matches!(a, SyncAction::Broadcast { .. })).count()
    }

    fn swap_id(actions: &[SyncAction]) -> u64 {
        actions
            .iter()
            .find_map(|a| match a {
                SyncAction::ApplyBaseMap { swap, .. } => Some(*swap),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn new_controller_is_uninitialized() {
        let controller = SyncController::new(TestEnv);
        assert_eq!(controller.state().phase(), &SessionPhase::Uninitialized);
        assert!(controller.map_provider().is_none());
        assert!(!controller.can_place_anchor());
    }

    #[test]
    fn frame_with_mapping_moves_to_local_map() {
        let controller = tracking_controller();
        assert_eq!(controller.state().phase(), &SessionPhase::Tracking(MapOrigin::Local));
        assert!(controller.can_place_anchor());
    }

    #[test]
    fn place_anchor_adds_broadcasts_and_clears_selection() {
        let mut controller = tracking_controller();
        controller.select_label("You are loved".to_string());

        let transform = Transform::translation(0.2, 0.0, -0.5);
        let actions = controller.handle(SyncEvent::SurfaceTapped { transform }).unwrap();

        assert_eq!(broadcasts(&actions), 1);
        assert_eq!(controller.store().len(), 1);
        assert_eq!(controller.store().anchors()[0].label, "You are loved");
        assert_eq!(controller.store().anchors()[0].transform, transform);
        assert!(controller.state().selected_label().is_none());

        let second = controller.handle(SyncEvent::SurfaceTapped { transform }).unwrap();
        assert!(second.is_empty());
        assert_eq!(controller.store().len(), 1);
    }

    #[test]
    fn empty_label_is_silent_noop() {
        let mut controller = tracking_controller();
        let actions = controller.place_anchor("", Transform::IDENTITY).unwrap();
        assert!(actions.is_empty());
        assert!(controller.store().is_empty());
    }

    #[test]
    fn place_before_start_is_invalid_state() {
        let mut controller = SyncController::new(TestEnv);
        let result = controller.place_anchor("hi", Transform::IDENTITY);
        assert!(matches!(result, Err(SyncError::InvalidState { .. })));
    }

    #[test]
    fn place_with_non_finite_pose_rejected() {
        let mut controller = tracking_controller();
        let result = controller.place_anchor("hi", Transform::translation(f64::NAN, 0.0, 0.0));
        assert!(matches!(result, Err(SyncError::InvalidAnchor { .. })));
        assert!(controller.store().is_empty());
    }

    #[test]
    fn share_before_tracking_is_map_unavailable() {
        let mut controller = SyncController::new(TestEnv);
        let result = controller.handle(SyncEvent::ShareMap);
        assert!(matches!(result, Err(SyncError::MapUnavailable { .. })));
        assert!(controller.state().notice().is_some());
    }

    #[test]
    fn share_before_mapping_is_map_unavailable() {
        let mut controller = SyncController::new(TestEnv);
        controller.handle(SyncEvent::SessionStarted).unwrap();
        let result = controller.share_current_map();
        assert!(matches!(result, Err(SyncError::MapUnavailable { .. })));
    }

    #[test]
    fn share_requests_then_broadcasts_snapshot() {
        let mut controller = tracking_controller();
        let actions = controller.share_current_map().unwrap();
        let request = match actions.as_slice() {
            [SyncAction::RequestSnapshot { request }] => *request,
            other => panic!("unexpected actions: {other:?}"),
        };

        let map = WorldMap::new(vec![1, 2, 3], vec![]);
        let actions = controller
            .handle(SyncEvent::SnapshotReady { request, result: Ok(map.clone()) })
            .unwrap();

        match actions.as_slice() {
            [SyncAction::Broadcast { kind: MessageKind::WorldMap, payload }] => {
                let decoded = SyncMessage::decode(payload).unwrap();
                assert_eq!(decoded, Decoded::Message(SyncMessage::WorldMap(map)));
            },
            other => panic!("unexpected actions: {other:?}"),
        }
    }

    #[test]
    fn failed_snapshot_reports_map_unavailable() {
        let mut controller = tracking_controller();
        controller.share_current_map().unwrap();

        let result = controller
            .handle(SyncEvent::SnapshotReady { request: 1, result: Err("no frame".to_string()) });
        assert!(matches!(result, Err(SyncError::MapUnavailable { .. })));
    }

    #[test]
    fn unknown_snapshot_request_ignored() {
        let mut controller = tracking_controller();
        let actions = controller
            .handle(SyncEvent::SnapshotReady { request: 42, result: Ok(WorldMap::new(vec![], vec![])) })
            .unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn inbound_map_swaps_and_records_provider() {
        let mut controller = tracking_controller();
        controller.place_anchor("mine", Transform::IDENTITY).unwrap();

        let p = peer(1, "P");
        let map = WorldMap::new(vec![9], vec![anchor("theirs", 1.0)]);
        let actions =
            controller.handle_incoming(&encoded(SyncMessage::WorldMap(map)), &p).unwrap();

        assert!(actions.contains(&SyncAction::AnchorsCleared));
        assert!(controller.store().is_empty());
        assert!(controller.state().is_swapping());
        assert!(controller.map_provider().is_none());

        let swap = swap_id(&actions);
        let actions = controller.handle(SyncEvent::BaseMapApplied { swap }).unwrap();

        assert_eq!(actions, vec![SyncAction::AnchorAdded(anchor("theirs", 1.0))]);
        assert_eq!(controller.map_provider(), Some(&p));
        assert!(controller.state().provider_since().is_some());
    }

    #[test]
    fn anchors_queue_behind_swap() {
        let mut controller = tracking_controller();
        let p = peer(1, "P");
        let q = peer(2, "Q");

        let actions = controller
            .handle_incoming(&encoded(SyncMessage::WorldMap(WorldMap::new(vec![1], vec![]))), &p)
            .unwrap();
        let swap = swap_id(&actions);

        let queued = controller
            .handle_incoming(&encoded(SyncMessage::Anchor(anchor("late", 2.0))), &q)
            .unwrap();
        assert!(queued.is_empty());
        assert_eq!(controller.state().backlog_len(), 1);

        let actions = controller.handle(SyncEvent::BaseMapApplied { swap }).unwrap();
        assert_eq!(actions, vec![SyncAction::AnchorAdded(anchor("late", 2.0))]);
        assert_eq!(controller.store().anchors(), &[anchor("late", 2.0)]);
    }

    #[test]
    fn second_map_waits_for_first_and_wins() {
        let mut controller = tracking_controller();
        let p = peer(1, "P");
        let q = peer(2, "Q");

        let first = controller
            .handle_incoming(&encoded(SyncMessage::WorldMap(WorldMap::new(vec![1], vec![]))), &p)
            .unwrap();
        let second_map = WorldMap::new(vec![2], vec![anchor("from q", 0.0)]);
        let queued = controller
            .handle_incoming(&encoded(SyncMessage::WorldMap(second_map.clone())), &q)
            .unwrap();
        assert!(queued.is_empty());

        let actions = controller.handle(SyncEvent::BaseMapApplied { swap: swap_id(&first) }).unwrap();
        assert_eq!(controller.map_provider(), Some(&p));
        let next_swap = swap_id(&actions);
        assert!(actions.contains(&SyncAction::ApplyBaseMap { swap: next_swap, map: second_map }));

        controller.handle(SyncEvent::BaseMapApplied { swap: next_swap }).unwrap();
        assert_eq!(controller.map_provider(), Some(&q));
        assert_eq!(controller.store().anchors(), &[anchor("from q", 0.0)]);
    }

    #[test]
    fn local_placement_during_swap_broadcasts_now_inserts_later() {
        let mut controller = tracking_controller();
        let actions = controller
            .handle_incoming(
                &encoded(SyncMessage::WorldMap(WorldMap::new(vec![1], vec![]))),
                &peer(1, "P"),
            )
            .unwrap();
        let swap = swap_id(&actions);

        let placed = controller.place_anchor("mine", Transform::IDENTITY).unwrap();
        assert_eq!(broadcasts(&placed), 1);
        assert!(controller.store().is_empty());

        controller.handle(SyncEvent::BaseMapApplied { swap }).unwrap();
        assert_eq!(controller.store().len(), 1);
    }

    #[test]
    fn payloads_before_start_are_replayed() {
        let mut controller = SyncController::new(TestEnv);
        let actions = controller
            .handle_incoming(&encoded(SyncMessage::Anchor(anchor("early", 0.0))), &peer(1, "P"))
            .unwrap();
        assert!(actions.is_empty());

        let actions = controller.handle(SyncEvent::SessionStarted).unwrap();
        assert_eq!(actions, vec![SyncAction::AnchorAdded(anchor("early", 0.0))]);
    }

    #[test]
    fn malformed_bytes_are_non_fatal() {
        let mut controller = tracking_controller();
        let r = peer(3, "R");

        let result = controller.handle_incoming(&Bytes::from_static(b"\xff\xfe"), &r);
        match result {
            Err(err @ SyncError::Decode { .. }) => assert!(!err.is_fatal()),
            other => panic!("expected decode error, got {other:?}"),
        }
        assert!(controller.store().is_empty());
        assert_eq!(controller.state().inbound().malformed, 1);

        controller
            .handle_incoming(&encoded(SyncMessage::Anchor(anchor("ok", 0.0))), &r)
            .unwrap();
        assert_eq!(controller.store().len(), 1);
    }

    #[test]
    fn unconfirmed_reset_does_nothing() {
        let mut controller = tracking_controller();
        controller.place_anchor("keep", Transform::IDENTITY).unwrap();

        let actions = controller.handle(SyncEvent::ResetWorld { confirmed: false }).unwrap();
        assert!(actions.is_empty());
        assert_eq!(controller.store().len(), 1);
    }

    #[test]
    fn confirmed_reset_clears_everything_without_broadcast() {
        let mut controller = tracking_controller();
        let p = peer(1, "P");
        let actions = controller
            .handle_incoming(&encoded(SyncMessage::WorldMap(WorldMap::new(vec![1], vec![]))), &p)
            .unwrap();
        controller.handle(SyncEvent::BaseMapApplied { swap: swap_id(&actions) }).unwrap();
        assert_eq!(controller.map_provider(), Some(&p));

        let actions = controller.handle(SyncEvent::ResetWorld { confirmed: true }).unwrap();
        assert_eq!(actions, vec![SyncAction::AnchorsCleared, SyncAction::ResetTracking]);
        assert_eq!(broadcasts(&actions), 0);
        assert!(controller.map_provider().is_none());
        assert!(controller.store().is_empty());
        assert_eq!(controller.state().phase(), &SessionPhase::Tracking(MapOrigin::NoMap));
    }

    #[test]
    fn reset_supersedes_in_flight_swap() {
        let mut controller = tracking_controller();
        let actions = controller
            .handle_incoming(
                &encoded(SyncMessage::WorldMap(WorldMap::new(vec![1], vec![anchor("a", 0.0)]))),
                &peer(1, "P"),
            )
            .unwrap();
        let swap = swap_id(&actions);

        controller.reset_world(true);
        let late = controller.handle(SyncEvent::BaseMapApplied { swap }).unwrap();

        assert!(late.is_empty());
        assert!(controller.map_provider().is_none());
        assert!(controller.store().is_empty());
    }

    #[test]
    fn failed_base_map_records_no_provider() {
        let mut controller = tracking_controller();
        let p = peer(1, "P");
        let q = peer(2, "Q");
        let map = WorldMap::new(vec![1], vec![anchor("theirs", 0.0)]);
        let actions =
            controller.handle_incoming(&encoded(SyncMessage::WorldMap(map)), &p).unwrap();
        let swap = swap_id(&actions);
        controller
            .handle_incoming(&encoded(SyncMessage::Anchor(anchor("queued", 1.0))), &q)
            .unwrap();

        let actions = controller
            .handle(SyncEvent::BaseMapFailed { swap, reason: "relocalization failed".to_string() })
            .unwrap();

        assert_eq!(
            actions,
            vec![SyncAction::ResetTracking, SyncAction::AnchorAdded(anchor("queued", 1.0))]
        );
        assert!(controller.map_provider().is_none());
        assert!(!controller.state().is_swapping());
        assert_eq!(controller.state().phase(), &SessionPhase::Tracking(MapOrigin::NoMap));
        assert_eq!(controller.store().anchors(), &[anchor("queued", 1.0)]);
        assert!(controller.state().notice().is_some_and(|n| n.contains("relocalization failed")));

        let late = controller.handle(SyncEvent::BaseMapApplied { swap }).unwrap();
        assert!(late.is_empty());
        assert!(controller.map_provider().is_none());
    }

    #[test]
    fn failure_of_superseded_swap_ignored() {
        let mut controller = tracking_controller();
        let p = peer(1, "P");
        let first = controller
            .handle_incoming(&encoded(SyncMessage::WorldMap(WorldMap::new(vec![1], vec![]))), &p)
            .unwrap();
        controller.reset_world(true);
        let second = controller
            .handle_incoming(&encoded(SyncMessage::WorldMap(WorldMap::new(vec![2], vec![]))), &p)
            .unwrap();

        let actions = controller
            .handle(SyncEvent::BaseMapFailed { swap: swap_id(&first), reason: "late".to_string() })
            .unwrap();

        assert!(actions.is_empty());
        assert!(controller.state().is_swapping());
        controller.handle(SyncEvent::BaseMapApplied { swap: swap_id(&second) }).unwrap();
        assert_eq!(controller.map_provider(), Some(&p));
    }

    #[test]
    fn reset_before_start_keeps_buffered_payloads() {
        let mut controller = SyncController::new(TestEnv);
        controller
            .handle_incoming(&encoded(SyncMessage::Anchor(anchor("early", 0.0))), &peer(1, "P"))
            .unwrap();

        let actions = controller.handle(SyncEvent::ResetWorld { confirmed: true }).unwrap();
        assert!(actions.is_empty());
        assert_eq!(controller.state().phase(), &SessionPhase::Uninitialized);
        assert_eq!(controller.state().backlog_len(), 1);

        let actions = controller.handle(SyncEvent::SessionStarted).unwrap();
        assert_eq!(actions, vec![SyncAction::AnchorAdded(anchor("early", 0.0))]);
        assert_eq!(controller.state().phase(), &SessionPhase::Tracking(MapOrigin::NoMap));
    }

    #[test]
    fn oversized_snapshot_is_map_unavailable() {
        let mut controller = tracking_controller();
        let request = match controller.share_current_map().unwrap().as_slice() {
            [SyncAction::RequestSnapshot { request }] => *request,
            other => panic!("unexpected actions: {other:?}"),
        };

        let huge = WorldMap::new(vec![0; affirm_proto::MAX_MESSAGE_SIZE + 1], vec![]);
        let result = controller.handle(SyncEvent::SnapshotReady { request, result: Ok(huge) });

        match result {
            Err(err @ SyncError::MapUnavailable { .. }) => {
                assert!(!err.is_fatal());
                assert!(err.is_user_actionable());
            },
            other => panic!("expected MapUnavailable, got {other:?}"),
        }
        assert!(controller.state().notice().is_some_and(|n| n.starts_with("Map unavailable")));
    }

    #[test]
    fn status_reflects_peers_and_provider() {
        let mut controller = tracking_controller();
        let p = peer(1, "P");
        let actions = controller
            .handle_incoming(&encoded(SyncMessage::WorldMap(WorldMap::new(vec![1], vec![]))), &p)
            .unwrap();
        controller.handle(SyncEvent::BaseMapApplied { swap: swap_id(&actions) }).unwrap();

        let status = controller.status(&[p.clone(), peer(2, "Q")]);
        assert_eq!(status.connected_peers, 2);
        assert_eq!(status.map_provider, Some(p));
        assert_eq!(status.inbound.maps, 1);
    }

    #[test]
    fn interruption_sets_notice_until_next_frame() {
        let mut controller = tracking_controller();
        controller.handle(SyncEvent::SessionInterrupted).unwrap();
        assert_eq!(controller.status(&[]).message(), "Session was interrupted");

        controller
            .handle(SyncEvent::FrameUpdated {
                mapping: MappingStatus::Mapped,
                tracking: TrackingState::Normal,
            })
            .unwrap();
        assert!(controller.state().notice().is_none());
    }

    proptest! {
        #[test]
        fn prop_every_payload_classified_once(
            payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..32)
        ) {
            let mut controller = tracking_controller();
            let sender = peer(9, "fuzz");

            for (i, bytes) in payloads.into_iter().enumerate() {
                let _ = controller.handle_incoming(&Bytes::from(bytes), &sender);
                prop_assert_eq!(controller.state().inbound().total(), i as u64 + 1);
            }
        }

        #[test]
        fn prop_provider_only_after_applied_peer_map(
            steps in prop::collection::vec(0u8..4, 0..40)
        ) {
            let mut controller = tracking_controller();
            let mut last_applied_from: Option<Peer> = None;

            for (i, step) in steps.into_iter().enumerate() {
                match step {
                    0 => {
                        let from = peer(i as u64, "p");
                        let map = WorldMap::new(vec![i as u8], vec![]);
                        let _ = controller.handle_incoming(&encoded(SyncMessage::WorldMap(map)), &from);
                    },
                    1 => {
                        if let Some(in_flight) = controller.state.swap_in_flight.clone() {
                            controller.handle(SyncEvent::BaseMapApplied { swap: in_flight.swap }).unwrap();
                            last_applied_from = Some(in_flight.provider);
                        }
                    },
                    2 => {
                        controller.reset_world(true);
                        last_applied_from = None;
                    },
                    _ => {
                        let _ = controller.place_anchor("x", Transform::IDENTITY);
                    },
                }
                prop_assert_eq!(controller.map_provider(), last_applied_from.as_ref());
            }
        }
    }
}
