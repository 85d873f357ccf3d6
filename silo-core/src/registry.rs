//! In-memory metadata registry for objects and their chunks.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metadata for one stored object.
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    pub id: u64,
    pub source_name: String,
    pub ready: bool,
    /// Set exactly once, when the object transitions to ready.
    pub chunk_count: Option<u32>,
}

/// Metadata for one stored chunk, keyed by `(object_id, index)`.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub content_hash: String,
    pub ready: bool,
}

#[derive(Default)]
struct Inner {
    objects: HashMap<u64, ObjectRecord>,
    chunks: HashMap<(u64, u32), ChunkRecord>,
}

/// Registry owns both metadata maps behind a single mutex and exposes
/// only atomic operations; callers never see the raw maps.
///
/// Lifecycle operations additionally hold the owning object's lock
/// while calling in here. `snapshot_ready` is the one deliberate
/// exception: it reads without any object lock, so an object mid-put
/// or mid-delete may or may not appear in its output.
pub struct Registry {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Allocate a fresh object id and its non-ready record.
    /// Ids are monotonically increasing and never reused.
    pub fn allocate(&self, source_name: &str) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.lock();
        inner.objects.insert(
            id,
            ObjectRecord {
                id,
                source_name: source_name.to_string(),
                ready: false,
                chunk_count: None,
            },
        );
        id
    }

    pub fn get_object(&self, object_id: u64) -> Option<ObjectRecord> {
        self.lock().objects.get(&object_id).cloned()
    }

    /// Record that the persisted representation of one chunk exists and
    /// its content hash is known.
    pub fn record_chunk_ready(&self, object_id: u64, index: u32, content_hash: String) {
        self.lock().chunks.insert(
            (object_id, index),
            ChunkRecord {
                content_hash,
                ready: true,
            },
        );
    }

    /// The recorded content hash of a ready chunk.
    pub fn chunk_hash(&self, object_id: u64, index: u32) -> Option<String> {
        self.lock()
            .chunks
            .get(&(object_id, index))
            .filter(|chunk| chunk.ready)
            .map(|chunk| chunk.content_hash.clone())
    }

    /// Transition an object to ready, fixing its chunk count.
    ///
    /// Returns `false` without mutating anything unless every chunk
    /// record for `0..chunk_count` is ready.
    pub fn mark_ready(&self, object_id: u64, chunk_count: u32) -> bool {
        let mut inner = self.lock();
        let all_ready = (0..chunk_count)
            .all(|index| inner.chunks.get(&(object_id, index)).is_some_and(|c| c.ready));
        if !all_ready {
            return false;
        }
        match inner.objects.get_mut(&object_id) {
            Some(object) => {
                object.ready = true;
                object.chunk_count = Some(chunk_count);
                true
            }
            None => false,
        }
    }

    /// Mark an object and all of its chunk records not-ready, the first
    /// step of a delete.
    ///
    /// Returns `false` when some chunk record for `0..chunk_count` is
    /// missing; the object is still marked not-ready in that case.
    pub fn mark_not_ready(&self, object_id: u64, chunk_count: u32) -> bool {
        let mut inner = self.lock();
        if let Some(object) = inner.objects.get_mut(&object_id) {
            object.ready = false;
        }
        let mut all_present = true;
        for index in 0..chunk_count {
            match inner.chunks.get_mut(&(object_id, index)) {
                Some(chunk) => chunk.ready = false,
                None => all_present = false,
            }
        }
        all_present
    }

    pub fn remove_chunk(&self, object_id: u64, index: u32) {
        self.lock().chunks.remove(&(object_id, index));
    }

    pub fn remove_object(&self, object_id: u64) {
        self.lock().objects.remove(&object_id);
    }

    /// Snapshot of `(id, source_name)` for every ready object, ordered
    /// by id. Taken without any object lock; see the type-level note.
    pub fn snapshot_ready(&self) -> Vec<(u64, String)> {
        let inner = self.lock();
        let mut items: Vec<(u64, String)> = inner
            .objects
            .values()
            .filter(|object| object.ready)
            .map(|object| (object.id, object.source_name.clone()))
            .collect();
        items.sort_by_key(|(id, _)| *id);
        items
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("registry mutex poisoned")
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_monotonic_ids() {
        let registry = Registry::new();
        let a = registry.allocate("a.bin");
        let b = registry.allocate("b.bin");
        let c = registry.allocate("c.bin");
        assert!(a < b && b < c);

        let record = registry.get_object(a).unwrap();
        assert!(!record.ready);
        assert_eq!(record.chunk_count, None);
        assert_eq!(record.source_name, "a.bin");
    }

    #[test]
    fn test_mark_ready_requires_all_chunks() {
        let registry = Registry::new();
        let id = registry.allocate("partial.bin");
        registry.record_chunk_ready(id, 0, "hash0".into());

        assert!(!registry.mark_ready(id, 2));
        assert!(!registry.get_object(id).unwrap().ready);

        registry.record_chunk_ready(id, 1, "hash1".into());
        assert!(registry.mark_ready(id, 2));

        let record = registry.get_object(id).unwrap();
        assert!(record.ready);
        assert_eq!(record.chunk_count, Some(2));
    }

    #[test]
    fn test_chunk_hash_only_when_ready() {
        let registry = Registry::new();
        let id = registry.allocate("f.bin");
        registry.record_chunk_ready(id, 0, "hash0".into());
        assert_eq!(registry.chunk_hash(id, 0).as_deref(), Some("hash0"));

        registry.mark_not_ready(id, 1);
        assert_eq!(registry.chunk_hash(id, 0), None);
    }

    #[test]
    fn test_mark_not_ready_reports_missing_chunks() {
        let registry = Registry::new();
        let id = registry.allocate("f.bin");
        registry.record_chunk_ready(id, 0, "hash0".into());
        registry.record_chunk_ready(id, 1, "hash1".into());
        registry.mark_ready(id, 2);

        registry.remove_chunk(id, 1);
        assert!(!registry.mark_not_ready(id, 2));
    }

    #[test]
    fn test_snapshot_ready_filters_and_sorts() {
        let registry = Registry::new();
        let a = registry.allocate("ready.bin");
        let b = registry.allocate("pending.bin");
        registry.mark_ready(a, 0);

        let snapshot = registry.snapshot_ready();
        assert_eq!(snapshot, vec![(a, "ready.bin".to_string())]);
        assert!(registry.get_object(b).is_some());
    }
}
