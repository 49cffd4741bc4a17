//! Fuzz target for [`SyncController`] inbound handling
//!
//! Peers are untrusted: any byte string may arrive at any point in the
//! session lifecycle, interleaved with local placements, shares, swap
//! completions and resets.
//!
//! # Strategy
//!
//! - Raw payloads: arbitrary bytes straight into `DataReceived`
//! - Structured payloads: valid anchors and maps with fuzzed contents, so the
//!   swap queue is actually exercised
//! - Lifecycle: payloads before `SessionStarted`, stale, duplicate and
//!   failed swap completions, resets mid-swap and before start
//!
//! # Invariants
//!
//! - NEVER panic on any input
//! - No error is fatal
//! - Every inbound payload increments exactly one classification counter
//! - Map provider is `Some` exactly in `Tracking(Peer)`
//! - Store is empty while a swap is in flight

#![no_main]

use std::{
    future::Future,
    time::{Duration, Instant},
};

use affirm_core::{
    Environment, MapOrigin, MappingStatus, Peer, SessionPhase, SyncAction, SyncController,
    SyncEvent, TrackingState,
};
use affirm_proto::{Anchor, SyncMessage, Transform, WorldMap};
use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

#[derive(Clone)]
struct FuzzEnv {
    epoch: Instant,
}

impl Environment for FuzzEnv {
    fn now(&self) -> Instant {
        self.epoch
    }

    fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(0x5a);
    }
}

#[derive(Debug, Clone, Arbitrary)]
enum FuzzEvent {
    Start,
    Frame { mapped: bool },
    Raw { from: u8, bytes: Vec<u8> },
    Anchor { from: u8, label: String, x: f64 },
    Map { from: u8, data: Vec<u8>, labels: Vec<String> },
    Place { label: String, x: f64 },
    Share,
    SnapshotReady { request: u8, ok: bool },
    CompleteSwap { offset: i8 },
    FailSwap { offset: i8, reason: String },
    Reset { confirmed: bool },
}

fn peer(from: u8) -> Peer {
    Peer::new(u64::from(from), format!("peer-{from}"))
}

fn encode(message: SyncMessage) -> Option<Bytes> {
    message.encode().ok()
}

fuzz_target!(|events: Vec<FuzzEvent>| {
    let mut controller = SyncController::new(FuzzEnv { epoch: Instant::now() });
    let mut last_swap = 0u64;
    let mut received = 0u64;

    for event in events {
        let sync_event = match event {
            FuzzEvent::Start => SyncEvent::SessionStarted,
            FuzzEvent::Frame { mapped } => SyncEvent::FrameUpdated {
                mapping: if mapped { MappingStatus::Mapped } else { MappingStatus::NotAvailable },
                tracking: TrackingState::Normal,
            },
            FuzzEvent::Raw { from, bytes } => {
                received += 1;
                SyncEvent::DataReceived { bytes: Bytes::from(bytes), from: peer(from) }
            },
            FuzzEvent::Anchor { from, label, x } => {
                let Ok(anchor) = Anchor::new(label, Transform::translation(x, 0.0, 0.0)) else {
                    continue;
                };
                let Some(bytes) = encode(SyncMessage::Anchor(anchor)) else { continue };
                received += 1;
                SyncEvent::DataReceived { bytes, from: peer(from) }
            },
            FuzzEvent::Map { from, data, labels } => {
                let anchors = labels
                    .into_iter()
                    .filter_map(|l| Anchor::new(l, Transform::IDENTITY).ok())
                    .collect();
                let Some(bytes) = encode(SyncMessage::WorldMap(WorldMap::new(data, anchors)))
                else {
                    continue;
                };
                received += 1;
                SyncEvent::DataReceived { bytes, from: peer(from) }
            },
            FuzzEvent::Place { label, x } => {
                SyncEvent::PlaceAnchor { label, transform: Transform::translation(x, 0.0, 0.0) }
            },
            FuzzEvent::Share => SyncEvent::ShareMap,
            FuzzEvent::SnapshotReady { request, ok } => SyncEvent::SnapshotReady {
                request: u64::from(request),
                result: if ok { Ok(WorldMap::new(vec![1], vec![])) } else { Err("fuzz".into()) },
            },
            FuzzEvent::CompleteSwap { offset } => SyncEvent::BaseMapApplied {
                swap: last_swap.saturating_add_signed(i64::from(offset)),
            },
            FuzzEvent::FailSwap { offset, reason } => SyncEvent::BaseMapFailed {
                swap: last_swap.saturating_add_signed(i64::from(offset)),
                reason,
            },
            FuzzEvent::Reset { confirmed } => SyncEvent::ResetWorld { confirmed },
        };

        match controller.handle(sync_event) {
            Ok(actions) => {
                for action in actions {
                    if let SyncAction::ApplyBaseMap { swap, .. } = action {
                        last_swap = swap;
                    }
                }
            },
            Err(e) => assert!(!e.is_fatal(), "fatal error from fuzzed input: {e}"),
        }

        let state = controller.state();
        assert_eq!(state.inbound().total(), received);
        assert_eq!(
            controller.map_provider().is_some(),
            matches!(state.phase(), SessionPhase::Tracking(MapOrigin::Peer(_)))
        );
        if state.is_swapping() {
            assert!(controller.store().is_empty());
        }
    }
});
