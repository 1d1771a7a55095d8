//! In-flight envelope registry.

use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use pipeline::{EnvelopeId, Timestamp};

/// Set of envelope IDs currently being processed, with their admission time.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    entries: Arc<DashMap<EnvelopeId, Timestamp>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id`. Returns `None` if it is already in flight.
    ///
    /// The entry is removed when the returned guard is dropped.
    pub fn register(&self, id: &EnvelopeId) -> Option<InFlightGuard> {
        match self.entries.entry(id.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(Timestamp::now());
                Some(InFlightGuard {
                    entries: Arc::clone(&self.entries),
                    id: id.clone(),
                })
            }
        }
    }

    pub fn contains(&self, id: &EnvelopeId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Removes its envelope from the registry on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    entries: Arc<DashMap<EnvelopeId, Timestamp>>,
    id: EnvelopeId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.entries.remove(&self.id);
    }
}
