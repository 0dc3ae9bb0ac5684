//! Global event dispatch table.
//!
//! Bus watches capture nothing but an integer correlation ID. This table maps
//! that ID back to the live controller. IDs come from a monotonic counter
//! guarded by the same lock as the map and are never reused, so a late
//! message for a retired ID can only miss, never reach an unrelated
//! controller.

use super::launch::{GstLaunch, LaunchShared};
use gstlaunch_types::LaunchId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Weak};

static LAUNCHES: LazyLock<RwLock<DispatchTable<LaunchShared>>> =
    LazyLock::new(|| RwLock::new(DispatchTable::new()));

/// ID-keyed registry of weakly held entries.
///
/// Entries are weak so the table never keeps a controller alive on its own;
/// an entry whose owner is gone resolves as a miss.
#[derive(Debug)]
pub(crate) struct DispatchTable<T> {
    next_id: LaunchId,
    entries: HashMap<LaunchId, Weak<T>>,
}

impl<T> DispatchTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            entries: HashMap::new(),
        }
    }

    /// Allocate the next ID, build the entry with it and store it.
    pub(crate) fn register_with<F>(&mut self, build: F) -> Arc<T>
    where
        F: FnOnce(LaunchId) -> Arc<T>,
    {
        let id = self.next_id;
        self.next_id += 1;
        let entry = build(id);
        self.entries.insert(id, Arc::downgrade(&entry));
        entry
    }

    pub(crate) fn resolve(&self, id: LaunchId) -> Option<Arc<T>> {
        self.entries.get(&id).and_then(Weak::upgrade)
    }

    pub(crate) fn unregister(&mut self, id: LaunchId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub(crate) fn contains(&self, id: LaunchId) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Register a new controller under a fresh ID.
pub(crate) fn register<F>(build: F) -> Arc<LaunchShared>
where
    F: FnOnce(LaunchId) -> Arc<LaunchShared>,
{
    LAUNCHES.write().register_with(build)
}

/// Resolve an ID to its controller.
///
/// The read lock is released before returning, so callers never run user
/// code while holding it.
pub(crate) fn resolve(id: LaunchId) -> Option<GstLaunch> {
    let shared = LAUNCHES.read().resolve(id);
    shared.map(GstLaunch::from_shared)
}

/// Retire an ID. Later messages for it are dropped.
pub(crate) fn unregister(id: LaunchId) -> bool {
    LAUNCHES.write().unregister(id)
}

/// Whether `id` still has an entry, live or stale.
pub fn is_registered(id: LaunchId) -> bool {
    LAUNCHES.read().contains(id)
}

/// Number of IDs currently registered.
pub fn registered_count() -> usize {
    LAUNCHES.read().len()
}
