//! Per-object mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

/// One exclusive lock per object id, serializing that object's full
/// multi-chunk lifecycle while leaving different objects independent.
///
/// Entries are created exactly once, at the moment put allocates the
/// id. get and delete look an entry up and treat a miss as an unknown
/// object rather than faulting.
pub struct ObjectLocks {
    entries: Mutex<HashMap<u64, Arc<AsyncMutex<()>>>>,
}

impl ObjectLocks {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Create the lock entry for a freshly allocated id. The table
    /// mutex makes creation atomic with respect to concurrent lookups.
    pub fn create(&self, object_id: u64) -> Arc<AsyncMutex<()>> {
        let mut entries = self.entries.lock().expect("lock table mutex poisoned");
        entries
            .entry(object_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Safe lookup: `None` means the id was never allocated, or its
    /// object has been fully deleted.
    pub fn get(&self, object_id: u64) -> Option<Arc<AsyncMutex<()>>> {
        self.entries
            .lock()
            .expect("lock table mutex poisoned")
            .get(&object_id)
            .cloned()
    }

    /// Drop the entry after a fully successful delete. Tasks already
    /// holding the `Arc` can still acquire it; they will then find the
    /// object gone from the registry.
    pub fn remove(&self, object_id: u64) {
        self.entries
            .lock()
            .expect("lock table mutex poisoned")
            .remove(&object_id);
    }

    pub fn contains(&self, object_id: u64) -> bool {
        self.entries
            .lock()
            .expect("lock table mutex poisoned")
            .contains_key(&object_id)
    }
}

impl Default for ObjectLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_lookup_of_unknown_id() {
        let locks = ObjectLocks::new();
        assert!(locks.get(99).is_none());
        assert!(!locks.contains(99));
    }

    #[test]
    fn test_create_then_lookup_and_remove() {
        let locks = ObjectLocks::new();
        let created = locks.create(7);
        let found = locks.get(7).unwrap();
        assert!(Arc::ptr_eq(&created, &found));

        locks.remove(7);
        assert!(locks.get(7).is_none());
    }

    #[tokio::test]
    async fn test_lock_serializes_holders() {
        let locks = ObjectLocks::new();
        let lock = locks.create(1);

        let guard = lock.lock().await;
        assert!(locks.get(1).unwrap().try_lock().is_err());
        drop(guard);
        assert!(locks.get(1).unwrap().try_lock().is_ok());
    }
}
