//! Rendering seam.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use affirm_proto::Anchor;

/// Draws anchors. Called from the session's event loop, in store order.
pub trait Renderer: Send + Sync {
    /// An anchor joined the store.
    fn on_anchor_added(&self, anchor: &Anchor);

    /// The store was cleared.
    fn on_clear_all(&self);
}

#[derive(Debug, Default)]
struct Scene {
    visible: Vec<Anchor>,
    clears: u32,
}

/// Renderer that records what it would draw.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    scene: Arc<Mutex<Scene>>,
}

impl RecordingRenderer {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels on screen, in insertion order.
    pub fn visible(&self) -> Vec<Anchor> {
        self.lock().visible.clone()
    }

    /// Number of times the scene was cleared.
    pub fn clear_count(&self) -> u32 {
        self.lock().clears
    }

    fn lock(&self) -> MutexGuard<'_, Scene> {
        self.scene.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Renderer for RecordingRenderer {
    fn on_anchor_added(&self, anchor: &Anchor) {
        tracing::trace!(label = %anchor.label, "render anchor");
        self.lock().visible.push(anchor.clone());
    }

    fn on_clear_all(&self) {
        let mut scene = self.lock();
        scene.visible.clear();
        scene.clears += 1;
    }
}
