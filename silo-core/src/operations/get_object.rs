use crate::error::{Result, SiloError};
use crate::locks::ObjectLocks;
use crate::pool::IoPool;
use crate::registry::Registry;
use crate::storage::{OutputStore, chunk_key};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Clone)]
pub struct GetObjectOperation {
    registry: Arc<Registry>,
    locks: Arc<ObjectLocks>,
    pool: Arc<IoPool>,
    output_store: Arc<OutputStore>,
    batch_size: u32,
}

#[derive(Debug, Clone)]
pub struct GetObjectOperationRequest {
    pub object_id: u64,
}

#[derive(Debug, Clone)]
pub struct GetObjectOperationResult {
    pub object_id: u64,
    pub output_path: PathBuf,
    pub bytes_written: u64,
}

#[derive(Debug, Clone)]
pub enum GetObjectOperationOutcome {
    Reconstructed(GetObjectOperationResult),
    NotFound,
}

impl GetObjectOperation {
    pub fn new(
        registry: Arc<Registry>,
        locks: Arc<ObjectLocks>,
        pool: Arc<IoPool>,
        output_store: Arc<OutputStore>,
        batch_size: u32,
    ) -> Self {
        Self {
            registry,
            locks,
            pool,
            output_store,
            batch_size,
        }
    }

    pub async fn run(&self, request: GetObjectOperationRequest) -> Result<GetObjectOperationOutcome> {
        let GetObjectOperationRequest { object_id } = request;

        // Unknown ids never allocated a lock entry; report not-found
        // instead of indexing unconditionally.
        let Some(lock) = self.locks.get(object_id) else {
            return Ok(GetObjectOperationOutcome::NotFound);
        };
        let _guard = lock.lock().await;

        let Some(record) = self.registry.get_object(object_id).filter(|r| r.ready) else {
            return Ok(GetObjectOperationOutcome::NotFound);
        };
        let chunk_count = record.chunk_count.unwrap_or(0);

        let (output_path, mut file) = self.output_store.create(object_id).await?;
        match self.reconstruct(&mut file, object_id, chunk_count).await {
            Ok(bytes_written) => {
                file.flush().await?;
                tracing::info!(
                    "reconstructed object {} ({} bytes) into {:?}",
                    object_id,
                    bytes_written,
                    output_path
                );
                Ok(GetObjectOperationOutcome::Reconstructed(
                    GetObjectOperationResult {
                        object_id,
                        output_path,
                        bytes_written,
                    },
                ))
            }
            Err(error) => {
                // Policy: a reconstruction that aborts mid-way removes
                // its partial output instead of leaving it behind.
                drop(file);
                if let Err(cleanup) = fs::remove_file(&output_path).await {
                    tracing::warn!(
                        "failed to remove partial output {:?}: {}",
                        output_path,
                        cleanup
                    );
                }
                tracing::error!("get of object {} failed: {}", object_id, error);
                Err(error)
            }
        }
    }

    /// Read chunk indices `0..chunk_count` in strictly ascending order,
    /// in pool batches, appending decoded bytes to the output in order.
    /// The first unverifiable chunk aborts the reconstruction.
    async fn reconstruct(
        &self,
        file: &mut fs::File,
        object_id: u64,
        chunk_count: u32,
    ) -> Result<u64> {
        let mut bytes_written = 0u64;
        let mut index = 0u32;
        while index < chunk_count {
            let batch_end = chunk_count.min(index + self.batch_size);

            let mut items = Vec::with_capacity((batch_end - index) as usize);
            for chunk_index in index..batch_end {
                let key = chunk_key(object_id, chunk_index);
                let Some(expected_hash) = self.registry.chunk_hash(object_id, chunk_index) else {
                    return Err(SiloError::Corruption { key });
                };
                items.push((key, expected_hash));
            }

            let results = self.pool.read_batch(items).await?;
            for (chunk_index, raw) in (index..batch_end).zip(results) {
                let Some(raw) = raw else {
                    return Err(SiloError::Corruption {
                        key: chunk_key(object_id, chunk_index),
                    });
                };
                file.write_all(&raw).await?;
                bytes_written += raw.len() as u64;
            }
            index = batch_end;
        }
        Ok(bytes_written)
    }
}
