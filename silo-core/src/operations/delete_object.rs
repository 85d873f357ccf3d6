use crate::error::{Result, SiloError};
use crate::locks::ObjectLocks;
use crate::pool::IoPool;
use crate::registry::Registry;
use crate::storage::chunk_key;
use std::sync::Arc;

#[derive(Clone)]
pub struct DeleteObjectOperation {
    registry: Arc<Registry>,
    locks: Arc<ObjectLocks>,
    pool: Arc<IoPool>,
    batch_size: u32,
}

#[derive(Debug, Clone)]
pub struct DeleteObjectOperationRequest {
    pub object_id: u64,
}

#[derive(Debug, Clone)]
pub enum DeleteObjectOperationOutcome {
    Deleted { chunk_count: u32 },
    NotFound,
}

impl DeleteObjectOperation {
    pub fn new(
        registry: Arc<Registry>,
        locks: Arc<ObjectLocks>,
        pool: Arc<IoPool>,
        batch_size: u32,
    ) -> Self {
        Self {
            registry,
            locks,
            pool,
            batch_size,
        }
    }

    pub async fn run(
        &self,
        request: DeleteObjectOperationRequest,
    ) -> Result<DeleteObjectOperationOutcome> {
        let DeleteObjectOperationRequest { object_id } = request;

        let Some(lock) = self.locks.get(object_id) else {
            return Ok(DeleteObjectOperationOutcome::NotFound);
        };
        let guard = lock.lock().await;

        let Some(record) = self.registry.get_object(object_id).filter(|r| r.ready) else {
            return Ok(DeleteObjectOperationOutcome::NotFound);
        };
        let chunk_count = record.chunk_count.unwrap_or(0);

        // The object and its chunks go non-ready before any file is
        // touched, so a failed delete can never leave a ready object
        // pointing at missing chunks.
        if !self.registry.mark_not_ready(object_id, chunk_count) {
            return Err(SiloError::PartialFailure(format!(
                "object {}: some chunk records are missing",
                object_id
            )));
        }

        let mut index = 0u32;
        while index < chunk_count {
            let batch_end = chunk_count.min(index + self.batch_size);
            let keys: Vec<String> = (index..batch_end)
                .map(|chunk_index| chunk_key(object_id, chunk_index))
                .collect();

            let results = self.pool.delete_batch(keys).await?;

            // Chunk records leave the registry per successfully deleted
            // key; a failed key stops the delete with earlier removals
            // standing and the rest registered-but-unready.
            let mut failed: Option<u32> = None;
            for (chunk_index, deleted) in (index..batch_end).zip(results) {
                if deleted {
                    self.registry.remove_chunk(object_id, chunk_index);
                } else if failed.is_none() {
                    failed = Some(chunk_index);
                }
            }
            if let Some(chunk_index) = failed {
                tracing::error!(
                    "delete of object {} stopped: chunk {} could not be removed",
                    object_id,
                    chunk_index
                );
                return Err(SiloError::PartialFailure(format!(
                    "object {}: chunk {} could not be deleted",
                    object_id, chunk_index
                )));
            }
            index = batch_end;
        }

        self.registry.remove_object(object_id);
        drop(guard);
        self.locks.remove(object_id);

        tracing::info!("deleted object {} ({} chunks)", object_id, chunk_count);
        Ok(DeleteObjectOperationOutcome::Deleted { chunk_count })
    }
}
