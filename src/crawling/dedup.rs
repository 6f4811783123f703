//! Run-scoped deduplication by external id
//!
//! Only ids of accepted records are remembered. Cross-run deduplication is
//! left to the sinks (insert-if-absent / upsert).

use std::collections::HashSet;

use crate::domain::ExternalId;

#[derive(Debug, Default)]
pub struct DedupIndex {
    seen: HashSet<ExternalId>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `id` and returns `true` on first sight, `false` on repeat
    pub fn accept(&mut self, id: &ExternalId) -> bool {
        if self.seen.contains(id) {
            false
        } else {
            self.seen.insert(id.clone());
            true
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
