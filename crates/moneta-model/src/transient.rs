//! Transient business objects.
//!
//! Transient objects are not persisted; the registry itself handles
//! storage and retrieval. Lifetime is explicit and deterministic: an
//! object stays registered until its handle is removed or the registry is
//! cleared.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::bo::BusinessObject;

/// Registry of in-memory, non-persisted objects.
#[derive(Debug, Default)]
pub struct TransientRegistry {
    state: Mutex<TransientState>,
}

#[derive(Debug, Default)]
struct TransientState {
    next_handle: u64,
    objects: BTreeMap<u64, BusinessObject>,
}

impl TransientRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object, returning the handle used to remove it.
    pub fn add(&self, bo: BusinessObject) -> u64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = state.next_handle;
        state.next_handle += 1;
        state.objects.insert(handle, bo);
        handle
    }

    /// Remove an object by its handle.
    pub fn remove(&self, handle: u64) -> Option<BusinessObject> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .objects
            .remove(&handle)
    }

    /// Drop every registered object.
    pub fn clear(&self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .objects
            .clear();
    }

    /// Number of registered objects.
    pub fn count_rows(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .objects
            .len()
    }

    /// Ids of the registered objects that have one.
    pub fn matching_ids(&self) -> Vec<i64> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .objects
            .values()
            .filter_map(BusinessObject::id)
            .collect()
    }
}
