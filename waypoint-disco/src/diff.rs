//! Snapshot diffing.
//!
//! Sources that only expose full listings (a catalogue query, a file, an
//! API page) can be turned into an incremental event stream by feeding each
//! listing to a [`Diff`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::event::Event;
use crate::instance::Instance;

/// Stores a snapshot of instances and computes the events needed to go from
/// one snapshot to the next.
#[derive(Debug, Default)]
pub struct Diff {
    snapshot: Mutex<HashMap<String, Arc<Instance>>>,
}

impl Diff {
    /// Create a diff with an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the events that turn the stored snapshot into `state`, and
    /// store `state` as the new snapshot.
    ///
    /// Instances whose ID is new produce `Add`. Instances already known
    /// produce `Update` whether or not any field changed; consumers decide
    /// what counts as stale. Known IDs missing from `state` produce `Delete`.
    pub fn apply(&self, state: &[Arc<Instance>]) -> Vec<Event> {
        let mut snapshot = self.snapshot.lock();
        let mut events = Vec::with_capacity(state.len());
        let mut running = HashSet::with_capacity(state.len());

        for inst in state {
            running.insert(inst.id.clone());

            if snapshot.contains_key(&inst.id) {
                events.push(Event::update(Arc::clone(inst)));
            } else {
                events.push(Event::add(Arc::clone(inst)));
            }
            snapshot.insert(inst.id.clone(), Arc::clone(inst));
        }

        let gone: Vec<String> = snapshot
            .keys()
            .filter(|id| !running.contains(*id))
            .cloned()
            .collect();
        for id in gone {
            if let Some(inst) = snapshot.remove(&id) {
                events.push(Event::delete(inst));
            }
        }

        events
    }

    /// Copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Arc<Instance>> {
        self.snapshot.lock().clone()
    }

    /// Number of instances in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot.lock().len()
    }

    /// Check if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot.lock().is_empty()
    }
}
