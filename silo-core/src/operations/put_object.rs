use crate::budget::MemoryBudget;
use crate::error::{Result, SiloError};
use crate::locks::ObjectLocks;
use crate::pool::IoPool;
use crate::registry::Registry;
use crate::storage::chunk_key;
use bytes::Bytes;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncReadExt;

#[derive(Clone)]
pub struct PutObjectOperation {
    registry: Arc<Registry>,
    locks: Arc<ObjectLocks>,
    pool: Arc<IoPool>,
    budget: Arc<MemoryBudget>,
    chunk_size: u64,
    batch_size: u32,
}

#[derive(Debug, Clone)]
pub struct PutObjectOperationRequest {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PutObjectOperationResult {
    pub object_id: u64,
    pub chunk_count: u32,
}

impl PutObjectOperation {
    pub fn new(
        registry: Arc<Registry>,
        locks: Arc<ObjectLocks>,
        pool: Arc<IoPool>,
        budget: Arc<MemoryBudget>,
        chunk_size: u64,
        batch_size: u32,
    ) -> Self {
        Self {
            registry,
            locks,
            pool,
            budget,
            chunk_size,
            batch_size,
        }
    }

    pub async fn run(&self, request: PutObjectOperationRequest) -> Result<PutObjectOperationResult> {
        let PutObjectOperationRequest { path } = request;
        let source_name = path.to_string_lossy().to_string();

        // The id, its registry record and its lock entry all exist
        // before any chunk work begins. The object stays non-ready
        // until every chunk is written and verified.
        let object_id = self.registry.allocate(&source_name);
        let lock = self.locks.create(object_id);
        let _guard = lock.lock().await;

        match self.ingest(object_id, &path).await {
            Ok(chunk_count) => {
                tracing::info!(
                    "stored object {} ({} chunks) from {}",
                    object_id,
                    chunk_count,
                    source_name
                );
                Ok(PutObjectOperationResult {
                    object_id,
                    chunk_count,
                })
            }
            Err(error) => {
                // No rollback of already-written chunks and no retry;
                // the object simply never becomes ready.
                tracing::error!(
                    "put of object {} from {} failed: {}",
                    object_id,
                    source_name,
                    error
                );
                Err(error)
            }
        }
    }

    async fn ingest(&self, object_id: u64, path: &Path) -> Result<u32> {
        let mut file = fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        let chunk_count = u32::try_from(size.div_ceil(self.chunk_size)).map_err(|_| {
            SiloError::InvalidRequest(format!("file too large to chunk: {} bytes", size))
        })?;

        // Each batch reserves the full batch footprint up front and
        // returns it before moving on, so in-flight chunk memory stays
        // bounded across all concurrent puts.
        let reservation = self.chunk_size * u64::from(self.batch_size);
        let mut index = 0u32;
        while index < chunk_count {
            let batch_end = chunk_count.min(index + self.batch_size);
            self.budget.reserve(reservation).await?;
            let written = self
                .process_batch(&mut file, object_id, size, index..batch_end)
                .await;
            self.budget.release(reservation);

            for (chunk_index, content_hash) in written? {
                self.registry
                    .record_chunk_ready(object_id, chunk_index, content_hash);
            }
            index = batch_end;
        }

        if !self.registry.mark_ready(object_id, chunk_count) {
            return Err(SiloError::PartialFailure(format!(
                "object {}: not every chunk became ready",
                object_id
            )));
        }
        Ok(chunk_count)
    }

    /// Read one batch of raw chunks from the source file and submit it
    /// to the pool as a unit. Chunks are read and written in strictly
    /// ascending index order.
    async fn process_batch(
        &self,
        file: &mut fs::File,
        object_id: u64,
        size: u64,
        indices: Range<u32>,
    ) -> Result<Vec<(u32, String)>> {
        let mut items = Vec::with_capacity(indices.len());
        for chunk_index in indices.clone() {
            let offset = u64::from(chunk_index) * self.chunk_size;
            let len = self.chunk_size.min(size - offset) as usize;
            let mut buf = vec![0u8; len];
            file.read_exact(&mut buf).await?;
            items.push((chunk_key(object_id, chunk_index), Bytes::from(buf)));
        }

        let results = self.pool.write_batch(items).await?;
        Ok(indices
            .zip(results)
            .map(|(chunk_index, (_key, content_hash))| (chunk_index, content_hash))
            .collect())
    }
}
