//! Local set of placed anchors.

use affirm_proto::Anchor;

/// Authoritative local set of anchors.
///
/// Append-only until a full clear. Iteration follows insertion order so a
/// renderer re-drawing from scratch produces the same scene every time. Not
/// network aware; the controller decides what goes in.
#[derive(Debug, Clone, Default)]
pub struct WorldStateStore {
    anchors: Vec<Anchor>,
}

impl WorldStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an anchor.
    pub fn add_anchor(&mut self, anchor: Anchor) {
        self.anchors.push(anchor);
    }

    /// Remove every anchor.
    pub fn clear_all(&mut self) {
        self.anchors.clear();
    }

    /// Anchors in insertion order.
    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    /// Number of anchors held.
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// True if no anchors are held.
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use affirm_proto::Transform;

    use super::*;

    fn anchor(label: &str) -> Anchor {
        Anchor::new(label, Transform::IDENTITY).expect("valid anchor")
    }

    #[test]
    fn preserves_insertion_order() {
        let mut store = WorldStateStore::new();
        store.add_anchor(anchor("b"));
        store.add_anchor(anchor("a"));
        store.add_anchor(anchor("c"));

        let labels: Vec<_> = store.anchors().iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels, ["b", "a", "c"]);
    }

    #[test]
    fn duplicates_are_kept() {
        let mut store = WorldStateStore::new();
        store.add_anchor(anchor("same"));
        store.add_anchor(anchor("same"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn clear_all_empties() {
        let mut store = WorldStateStore::new();
        store.add_anchor(anchor("x"));
        store.clear_all();
        assert!(store.is_empty());
    }
}
