//! Run-wide set of product ids already recorded

use std::collections::HashSet;

/// Ids written during this run, shared across every category of a walk
#[derive(Debug, Default, Clone)]
pub struct DedupTracker {
    seen: HashSet<String>,
}

impl DedupTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has_seen(&self, product_id: &str) -> bool {
        self.seen.contains(product_id)
    }

    /// Returns `false` when the id was already present
    pub fn mark_seen(&mut self, product_id: &str) -> bool {
        self.seen.insert(product_id.to_string())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
