//! Bounded worker pool for chunk-level codec and backing-store work.

use crate::codec;
use crate::error::{Result, SiloError};
use crate::storage::ChunkStore;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// IoPool runs chunk work items with at most `workers` in flight at a
/// time. Each batched call is a barrier: it returns only once every
/// item in the batch has completed, with results in submission order.
///
/// The pool has no per-object exclusivity; batches from any number of
/// objects may be serviced concurrently, bounded only by the worker
/// count.
pub struct IoPool {
    store: Arc<ChunkStore>,
    workers: Arc<Semaphore>,
}

impl IoPool {
    pub fn new(store: Arc<ChunkStore>, workers: usize) -> Self {
        Self {
            store,
            workers: Arc::new(Semaphore::new(workers)),
        }
    }

    /// Encode and persist each `(key, raw)` item.
    /// Returns `(key, content_hash)` per item in submission order.
    pub async fn write_batch(&self, items: Vec<(String, Bytes)>) -> Result<Vec<(String, String)>> {
        let mut tasks = Vec::with_capacity(items.len());
        for (key, raw) in items {
            let workers = self.workers.clone();
            let store = self.store.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = workers
                    .acquire_owned()
                    .await
                    .map_err(|_| SiloError::ShuttingDown)?;
                let (encoded, content_hash) =
                    tokio::task::spawn_blocking(move || codec::encode(&raw))
                        .await
                        .map_err(|e| SiloError::Internal(format!("codec task failed: {}", e)))??;
                store.put(&key, encoded).await?;
                Ok((key, content_hash))
            }));
        }
        join_batch(tasks).await
    }

    /// Load, decode and hash-check each `(key, expected_hash)` item.
    /// `None` covers both a missing key and a verification failure;
    /// callers treat either as corruption.
    pub async fn read_batch(&self, items: Vec<(String, String)>) -> Result<Vec<Option<Bytes>>> {
        let mut tasks = Vec::with_capacity(items.len());
        for (key, expected_hash) in items {
            let workers = self.workers.clone();
            let store = self.store.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = workers
                    .acquire_owned()
                    .await
                    .map_err(|_| SiloError::ShuttingDown)?;
                // A chunk that is missing or cannot be read is the
                // same corruption condition to the caller; only the
                // codec pipeline itself failing is an engine fault.
                let persisted = match store.get(&key).await {
                    Ok(Some(persisted)) => persisted,
                    Ok(None) => {
                        tracing::warn!("chunk {} is missing from the backing store", key);
                        return Ok(None);
                    }
                    Err(error) => {
                        tracing::warn!("chunk {} could not be read: {}", key, error);
                        return Ok(None);
                    }
                };
                let verified = tokio::task::spawn_blocking(move || {
                    let raw = codec::decode(&persisted).ok()?;
                    if codec::compute_hash(&raw) != expected_hash {
                        return None;
                    }
                    Some(raw)
                })
                .await
                .map_err(|e| SiloError::Internal(format!("codec task failed: {}", e)))?;
                if verified.is_none() {
                    tracing::warn!("chunk {} failed verification", key);
                }
                Ok(verified)
            }));
        }
        join_batch(tasks).await
    }

    /// Delete each key. `false` means the chunk was absent or could not
    /// be removed.
    pub async fn delete_batch(&self, keys: Vec<String>) -> Result<Vec<bool>> {
        let mut tasks = Vec::with_capacity(keys.len());
        for key in keys {
            let workers = self.workers.clone();
            let store = self.store.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = workers
                    .acquire_owned()
                    .await
                    .map_err(|_| SiloError::ShuttingDown)?;
                Ok(store.delete(&key).await)
            }));
        }
        join_batch(tasks).await
    }

    /// Stop accepting new submissions; further batch items fail with
    /// `ShuttingDown`. Callers must have joined every outstanding
    /// file-level task first, so no batch is in flight when the pool
    /// closes.
    pub fn close(&self) {
        self.workers.close();
    }

    pub fn is_closed(&self) -> bool {
        self.workers.is_closed()
    }
}

async fn join_batch<T>(tasks: Vec<JoinHandle<Result<T>>>) -> Result<Vec<T>> {
    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        let item = task
            .await
            .map_err(|e| SiloError::Internal(format!("pool task panicked: {}", e)))??;
        results.push(item);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::chunk_key;

    fn test_pool(dir: &std::path::Path) -> IoPool {
        let store = Arc::new(ChunkStore::new(dir.to_path_buf()).unwrap());
        IoPool::new(store, 2)
    }

    #[tokio::test]
    async fn test_write_then_read_batch() {
        let temp_dir = tempfile::tempdir().unwrap();
        let pool = test_pool(temp_dir.path());

        let items = vec![
            (chunk_key(1, 0), Bytes::from(vec![b'a'; 4096])),
            (chunk_key(1, 1), Bytes::from(vec![b'b'; 4096])),
            (chunk_key(1, 2), Bytes::from(vec![b'c'; 100])),
        ];
        let written = pool.write_batch(items.clone()).await.unwrap();
        assert_eq!(written.len(), 3);
        assert_eq!(written[0].0, chunk_key(1, 0));
        assert_eq!(written[2].0, chunk_key(1, 2));

        let reads = written
            .iter()
            .map(|(key, hash)| (key.clone(), hash.clone()))
            .collect();
        let loaded = pool.read_batch(reads).await.unwrap();
        for (original, raw) in items.iter().zip(&loaded) {
            assert_eq!(raw.as_ref().unwrap(), &original.1);
        }
    }

    #[tokio::test]
    async fn test_read_batch_reports_missing_and_mismatched() {
        let temp_dir = tempfile::tempdir().unwrap();
        let pool = test_pool(temp_dir.path());

        let written = pool
            .write_batch(vec![(chunk_key(2, 0), Bytes::from("payload"))])
            .await
            .unwrap();
        let good_hash = written[0].1.clone();

        let results = pool
            .read_batch(vec![
                (chunk_key(2, 0), good_hash),
                (chunk_key(2, 0), "0".repeat(64)),
                (chunk_key(2, 99), "0".repeat(64)),
            ])
            .await
            .unwrap();

        assert!(results[0].is_some());
        assert!(results[1].is_none());
        assert!(results[2].is_none());
    }

    #[tokio::test]
    async fn test_read_batch_treats_unreadable_chunk_as_corrupt() {
        let temp_dir = tempfile::tempdir().unwrap();
        let pool = test_pool(temp_dir.path());

        // A directory where the chunk file should be makes the read
        // fail with an I/O error even though the path exists.
        std::fs::create_dir(temp_dir.path().join(format!("{}.dat", chunk_key(5, 0)))).unwrap();

        let results = pool
            .read_batch(vec![(chunk_key(5, 0), "0".repeat(64))])
            .await
            .unwrap();

        assert_eq!(results, vec![None]);
    }

    #[tokio::test]
    async fn test_delete_batch_reports_per_key() {
        let temp_dir = tempfile::tempdir().unwrap();
        let pool = test_pool(temp_dir.path());

        pool.write_batch(vec![(chunk_key(3, 0), Bytes::from("x"))])
            .await
            .unwrap();

        let results = pool
            .delete_batch(vec![chunk_key(3, 0), chunk_key(3, 1)])
            .await
            .unwrap();
        assert_eq!(results, vec![true, false]);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_submissions() {
        let temp_dir = tempfile::tempdir().unwrap();
        let pool = test_pool(temp_dir.path());
        pool.close();
        assert!(pool.is_closed());

        let err = pool
            .write_batch(vec![(chunk_key(4, 0), Bytes::from("late"))])
            .await
            .unwrap_err();
        assert!(matches!(err, SiloError::ShuttingDown));
    }
}
