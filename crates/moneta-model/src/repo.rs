//! The identity map.
//!
//! An explicit repository owns the id→instance cache: constructing an
//! object with an id that is already known yields the cached instance
//! instead of a duplicate. Entries live until they are explicitly evicted
//! or the repository is cleared; there is no implicit weak eviction.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use moneta_core::error::Result;

use crate::bo::{BoMeta, BusinessObject};

use std::sync::Arc;

/// Explicit id→instance cache, keyed by (type name, id).
#[derive(Debug, Default)]
pub struct Repository {
    instances: Mutex<HashMap<(String, i64), BusinessObject>>,
}

impl Repository {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache an instance under its id. Instances without an id are
    /// ignored.
    pub fn register(&self, bo: &BusinessObject) {
        let Some(id) = bo.id() else { return };
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((bo.meta().type_name().to_string(), id), bo.clone());
    }

    /// The cached instance for (type, id), if any.
    pub fn cached(&self, type_name: &str, id: i64) -> Option<BusinessObject> {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(type_name.to_string(), id))
            .cloned()
    }

    /// An instance with the given id: the cached one when known, a fresh
    /// one (registered in the cache) otherwise.
    pub fn obtain(&self, meta: &Arc<BoMeta>, id: i64) -> Result<BusinessObject> {
        if let Some(cached) = self.cached(meta.type_name(), id) {
            return Ok(cached);
        }
        let mut bo = BusinessObject::new(Arc::clone(meta));
        bo.set_id(id)?;
        self.register(&bo);
        Ok(bo)
    }

    /// Drop one cached instance.
    pub fn evict(&self, type_name: &str, id: i64) {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(type_name.to_string(), id));
    }

    /// Drop every cached instance.
    pub fn clear(&self) {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of cached instances.
    pub fn len(&self) -> usize {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bo::{BoMetaBuilder, SchemaRegistry};
    use moneta_core::flags::ColumnFlags;
    use moneta_core::value::Value;

    fn meta() -> Arc<BoMeta> {
        let registry = SchemaRegistry::new();
        BoMetaBuilder::new("account")
            .str("name", ColumnFlags::NONE)
            .unwrap()
            .build_into(&registry)
    }

    #[test]
    fn test_obtain_returns_cached_instance() {
        let repo = Repository::new();
        let meta = meta();

        let mut first = repo.obtain(&meta, 1).unwrap();
        first.set("name", Value::Text("checking".into())).unwrap();
        repo.register(&first);

        let second = repo.obtain(&meta, 1).unwrap();
        assert_eq!(second.get("name"), Some(&Value::Text("checking".into())));
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_unregistered_instances_are_fresh() {
        let repo = Repository::new();
        let meta = meta();
        let bo = repo.obtain(&meta, 42).unwrap();
        assert_eq!(bo.id(), Some(42));
        assert!(bo.get("name").is_none());
    }

    #[test]
    fn test_evict_and_clear() {
        let repo = Repository::new();
        let meta = meta();
        repo.obtain(&meta, 1).unwrap();
        repo.obtain(&meta, 2).unwrap();
        assert_eq!(repo.len(), 2);

        repo.evict("account", 1);
        assert!(repo.cached("account", 1).is_none());
        assert!(repo.cached("account", 2).is_some());

        repo.clear();
        assert!(repo.is_empty());
    }
}
