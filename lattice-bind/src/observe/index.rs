//! Reverse Index
//!
//! Maps every ancestor path to the observed identifiers below it, so a write
//! to `a` only has to revisit the identifiers actually observed under `a`
//! instead of walking the new value.
//!
//! # How It Works
//!
//! Registering `a.b.c` records it as a descendant of `a` and of `a.b`.
//! Removing it undoes both edges and drops ancestors left without
//! descendants. The edge sets keep insertion order.

use std::collections::HashMap;

use indexmap::IndexSet;

use super::path::ancestors;

#[derive(Debug, Default)]
pub(crate) struct DescendantIndex {
    edges: HashMap<String, IndexSet<String>>,
}

impl DescendantIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record `identifier` under each of its ancestors.
    pub(crate) fn add(&mut self, identifier: &str) {
        for ancestor in ancestors(identifier) {
            self.edges
                .entry(ancestor.to_string())
                .or_default()
                .insert(identifier.to_string());
        }
    }

    pub(crate) fn remove(&mut self, identifier: &str) {
        for ancestor in ancestors(identifier) {
            if let Some(set) = self.edges.get_mut(ancestor) {
                set.shift_remove(identifier);
                if set.is_empty() {
                    self.edges.remove(ancestor);
                }
            }
        }
    }

    pub(crate) fn has_descendants(&self, ancestor: &str) -> bool {
        self.edges.contains_key(ancestor)
    }

    /// Observed identifiers below `ancestor`, shallower paths first and
    /// insertion order within a depth.
    pub(crate) fn descendants(&self, ancestor: &str) -> Vec<String> {
        let mut found: Vec<String> = self
            .edges
            .get(ancestor)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        found.sort_by_key(|path| path.matches('.').count());
        found
    }

    pub(crate) fn clear(&mut self) {
        self.edges.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.edges.len()
    }
}
