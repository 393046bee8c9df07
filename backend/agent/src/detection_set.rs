//! Detection aggregator for the active image.

use sightline_core::NormalizedDetection;

/// Ordered, append-only set of normalized detections for the active image.
///
/// No deduplication: an object box and a text box over the same region are
/// both kept and told apart by `kind`.
#[derive(Debug, Default, Clone)]
pub struct DetectionAggregator {
    items: Vec<NormalizedDetection>,
    resets: usize,
}

impl DetectionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, detections: impl IntoIterator<Item = NormalizedDetection>) {
        self.items.extend(detections);
    }

    /// Clear everything. Called once per active-image change.
    pub fn reset(&mut self) {
        self.items.clear();
        self.resets += 1;
    }

    /// Current ordered contents, for rendering. May be empty.
    pub fn snapshot(&self) -> Vec<NormalizedDetection> {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// How many times the set has been reset.
    pub fn resets(&self) -> usize {
        self.resets
    }
}
