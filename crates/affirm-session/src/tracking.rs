//! Device tracking subsystem seam.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use affirm_proto::{Anchor, WorldMap};
use async_trait::async_trait;
use thiserror::Error;

/// Surfaces the tracking subsystem should detect for hit-testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaneDetection {
    /// No plane detection.
    None,
    /// Floors, tables.
    #[default]
    Horizontal,
    /// Floors, tables and walls.
    HorizontalAndVertical,
}

/// Errors reported by the tracking subsystem.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackingError {
    /// The device cannot run world tracking.
    #[error("world tracking is not supported on this device")]
    Unsupported,

    /// No map snapshot could be captured.
    #[error("snapshot unavailable: {reason}")]
    SnapshotUnavailable {
        /// Why.
        reason: String,
    },

    /// The subsystem failed to (re)initialize.
    #[error("tracking failed: {reason}")]
    Failed {
        /// Why.
        reason: String,
    },
}

/// The device's world-tracking engine.
///
/// `apply_base_map` and `reset_fresh` are destructive: tracking restarts and
/// every anchor registered with the engine is discarded.
#[async_trait]
pub trait TrackingSystem: Send + Sync {
    /// True if the device can run world tracking at all.
    fn is_supported(&self) -> bool;

    /// Start tracking.
    async fn start(&self, plane_detection: PlaneDetection) -> Result<(), TrackingError>;

    /// Pause tracking.
    async fn pause(&self);

    /// Capture the current map, including the anchors registered with it.
    async fn current_snapshot(&self) -> Result<WorldMap, TrackingError>;

    /// Restart tracking relative to `map`.
    async fn apply_base_map(&self, map: &WorldMap) -> Result<(), TrackingError>;

    /// Restart tracking with no map.
    async fn reset_fresh(&self) -> Result<(), TrackingError>;

    /// Register an anchor with the engine.
    async fn add_anchor(&self, anchor: &Anchor);
}

#[derive(Debug, Default)]
struct SimulatedState {
    unsupported: bool,
    running: bool,
    mapped: bool,
    map_data: Vec<u8>,
    anchors: Vec<Anchor>,
    applied: Vec<WorldMap>,
    resets: u32,
    reject_maps: Option<String>,
}

/// In-memory tracking engine.
///
/// Snapshots carry the configured map bytes plus every anchor registered
/// since the last restart. Clones share state so tests can inspect it.
#[derive(Debug, Clone, Default)]
pub struct SimulatedTracking {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedTracking {
    /// Create a supported engine whose snapshots carry `map_data`.
    pub fn new(map_data: impl Into<Vec<u8>>) -> Self {
        let state = SimulatedState { map_data: map_data.into(), ..SimulatedState::default() };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    /// Create an engine that reports no tracking support.
    pub fn unsupported() -> Self {
        let state = SimulatedState { unsupported: true, ..SimulatedState::default() };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    /// Whether a snapshot can be captured.
    pub fn set_mapped(&self, mapped: bool) {
        self.lock().mapped = mapped;
    }

    /// Make every later `apply_base_map` fail with `reason`, leaving the
    /// current map in place.
    pub fn reject_base_maps(&self, reason: impl Into<String>) {
        self.lock().reject_maps = Some(reason.into());
    }

    /// True between `start` and `pause`.
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Anchors registered since the last restart.
    pub fn anchors(&self) -> Vec<Anchor> {
        self.lock().anchors.clone()
    }

    /// Base maps applied so far, oldest first.
    pub fn applied_maps(&self) -> Vec<WorldMap> {
        self.lock().applied.clone()
    }

    /// Number of fresh resets.
    pub fn reset_count(&self) -> u32 {
        self.lock().resets
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TrackingSystem for SimulatedTracking {
    fn is_supported(&self) -> bool {
        !self.lock().unsupported
    }

    async fn start(&self, _plane_detection: PlaneDetection) -> Result<(), TrackingError> {
        let mut state = self.lock();
        if state.unsupported {
            return Err(TrackingError::Unsupported);
        }
        state.running = true;
        Ok(())
    }

    async fn pause(&self) {
        self.lock().running = false;
    }

    async fn current_snapshot(&self) -> Result<WorldMap, TrackingError> {
        let state = self.lock();
        if !state.mapped {
            return Err(TrackingError::SnapshotUnavailable {
                reason: "not enough of the environment has been mapped".to_string(),
            });
        }
        Ok(WorldMap::new(state.map_data.clone(), state.anchors.clone()))
    }

    async fn apply_base_map(&self, map: &WorldMap) -> Result<(), TrackingError> {
        let mut state = self.lock();
        if let Some(reason) = &state.reject_maps {
            return Err(TrackingError::Failed { reason: reason.clone() });
        }
        state.anchors.clear();
        state.map_data.clone_from(&map.data);
        state.applied.push(map.clone());
        state.mapped = true;
        state.running = true;
        Ok(())
    }

    async fn reset_fresh(&self) -> Result<(), TrackingError> {
        let mut state = self.lock();
        state.anchors.clear();
        state.mapped = false;
        state.resets += 1;
        state.running = true;
        Ok(())
    }

    async fn add_anchor(&self, anchor: &Anchor) {
        self.lock().anchors.push(anchor.clone());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use affirm_proto::Transform;

    use super::*;

    #[tokio::test]
    async fn snapshot_requires_mapping() {
        let tracking = SimulatedTracking::new(vec![1, 2]);
        tracking.start(PlaneDetection::Horizontal).await.unwrap();

        assert!(matches!(
            tracking.current_snapshot().await,
            Err(TrackingError::SnapshotUnavailable { .. })
        ));

        tracking.set_mapped(true);
        let anchor = Anchor::new("hi", Transform::IDENTITY).unwrap();
        tracking.add_anchor(&anchor).await;

        let map = tracking.current_snapshot().await.unwrap();
        assert_eq!(map.data, vec![1, 2]);
        assert_eq!(map.anchors, vec![anchor]);
    }

    #[tokio::test]
    async fn apply_base_map_discards_anchors() {
        let tracking = SimulatedTracking::new(vec![]);
        tracking.add_anchor(&Anchor::new("old", Transform::IDENTITY).unwrap()).await;

        let map = WorldMap::new(vec![7], vec![]);
        tracking.apply_base_map(&map).await.unwrap();

        assert!(tracking.anchors().is_empty());
        assert_eq!(tracking.applied_maps(), vec![map]);
    }

    #[tokio::test]
    async fn rejected_base_map_keeps_current_map() {
        let tracking = SimulatedTracking::new(vec![1]);
        tracking.reject_base_maps("relocalization failed");

        let result = tracking.apply_base_map(&WorldMap::new(vec![7], vec![])).await;

        assert!(matches!(result, Err(TrackingError::Failed { .. })));
        assert!(tracking.applied_maps().is_empty());
    }

    #[tokio::test]
    async fn unsupported_refuses_to_start() {
        let tracking = SimulatedTracking::unsupported();
        assert!(!tracking.is_supported());
        assert_eq!(
            tracking.start(PlaneDetection::default()).await,
            Err(TrackingError::Unsupported)
        );
    }
}
