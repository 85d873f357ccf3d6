//! Engine facade wiring every component behind the object lifecycle.

use crate::budget::MemoryBudget;
use crate::error::{Result, SiloError};
use crate::locks::ObjectLocks;
use crate::operations::{
    DeleteObjectOperation, DeleteObjectOperationOutcome, DeleteObjectOperationRequest,
    GetObjectOperation, GetObjectOperationOutcome, GetObjectOperationRequest,
    ListObjectsOperation, ListObjectsOperationResult, PutObjectOperation,
    PutObjectOperationRequest, PutObjectOperationResult,
};
use crate::pool::IoPool;
use crate::registry::Registry;
use crate::storage::{ChunkStore, OutputStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Engine tunables. Plain values; the CLI layer maps its config-file
/// representation onto this.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bytes per chunk (the last chunk of an object may be shorter).
    pub chunk_size: u64,
    /// Worker count of the chunk processor pool.
    pub io_workers: usize,
    /// Chunks per pool submission.
    pub batch_size: u32,
    /// Admission budget for in-flight chunk memory, in bytes.
    pub memory_capacity: u64,
    /// Cap on concurrently running file-level operations.
    pub max_concurrent_ops: usize,
    /// Chunk staging directory.
    pub chunks_dir: PathBuf,
    /// Directory reconstructed objects are written to.
    pub output_dir: PathBuf,
}

impl EngineConfig {
    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(SiloError::Config("chunk_size must be positive".into()));
        }
        if self.io_workers == 0 {
            return Err(SiloError::Config("io_workers must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(SiloError::Config("batch_size must be positive".into()));
        }
        if self.max_concurrent_ops == 0 {
            return Err(SiloError::Config(
                "max_concurrent_ops must be positive".into(),
            ));
        }
        let batch_footprint = self.chunk_size * u64::from(self.batch_size);
        if self.memory_capacity < batch_footprint {
            return Err(SiloError::Config(format!(
                "memory_capacity of {} bytes cannot admit one batch of {} bytes",
                self.memory_capacity, batch_footprint
            )));
        }
        Ok(())
    }
}

/// Single-node chunked object storage engine.
///
/// Shutdown ordering contract: `stop_accepting` first, then join every
/// outstanding operation, and only then `close_pool`. Closing the pool
/// under running operations would fail their in-flight batches.
pub struct Engine {
    put_op: PutObjectOperation,
    get_op: GetObjectOperation,
    delete_op: DeleteObjectOperation,
    list_op: ListObjectsOperation,
    pool: Arc<IoPool>,
    budget: Arc<MemoryBudget>,
    locks: Arc<ObjectLocks>,
    chunk_store: Arc<ChunkStore>,
    output_store: Arc<OutputStore>,
    ops: Semaphore,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(Registry::new());
        let locks = Arc::new(ObjectLocks::new());
        let budget = Arc::new(MemoryBudget::new(config.memory_capacity));
        let chunk_store = Arc::new(ChunkStore::new(config.chunks_dir.clone())?);
        let output_store = Arc::new(OutputStore::new(config.output_dir.clone())?);
        let pool = Arc::new(IoPool::new(chunk_store.clone(), config.io_workers));

        Ok(Self {
            put_op: PutObjectOperation::new(
                registry.clone(),
                locks.clone(),
                pool.clone(),
                budget.clone(),
                config.chunk_size,
                config.batch_size,
            ),
            get_op: GetObjectOperation::new(
                registry.clone(),
                locks.clone(),
                pool.clone(),
                output_store.clone(),
                config.batch_size,
            ),
            delete_op: DeleteObjectOperation::new(
                registry.clone(),
                locks.clone(),
                pool.clone(),
                config.batch_size,
            ),
            list_op: ListObjectsOperation::new(registry),
            pool,
            budget,
            locks,
            chunk_store,
            output_store,
            ops: Semaphore::new(config.max_concurrent_ops),
        })
    }

    /// Ingest the file at `path` as a new object.
    pub async fn put(&self, path: impl Into<PathBuf>) -> Result<PutObjectOperationResult> {
        let _permit = self.admit().await?;
        self.put_op
            .run(PutObjectOperationRequest { path: path.into() })
            .await
    }

    /// Reconstruct an object into a newly named output file.
    pub async fn get(&self, object_id: u64) -> Result<GetObjectOperationOutcome> {
        let _permit = self.admit().await?;
        self.get_op.run(GetObjectOperationRequest { object_id }).await
    }

    /// Remove an object and its chunks.
    pub async fn delete(&self, object_id: u64) -> Result<DeleteObjectOperationOutcome> {
        let _permit = self.admit().await?;
        self.delete_op
            .run(DeleteObjectOperationRequest { object_id })
            .await
    }

    /// Snapshot of every ready object.
    pub async fn list(&self) -> Result<ListObjectsOperationResult> {
        let _permit = self.admit().await?;
        Ok(self.list_op.run())
    }

    /// Empty the chunk staging and output directories. Run at startup
    /// and again after shutdown has drained every operation.
    pub async fn purge_directories(&self) -> Result<()> {
        self.chunk_store.purge().await?;
        self.output_store.purge().await?;
        Ok(())
    }

    /// First phase of shutdown: refuse new file-level operations.
    pub fn stop_accepting(&self) {
        self.ops.close();
    }

    /// Final phase of shutdown: close the worker pool. Only call once
    /// every outstanding operation has been joined.
    pub fn close_pool(&self) {
        self.pool.close();
    }

    pub fn budget(&self) -> &MemoryBudget {
        &self.budget
    }

    pub fn locks(&self) -> &ObjectLocks {
        &self.locks
    }

    /// File-level admission: bounds concurrently running operations,
    /// independently of the chunk-level pool, and turns post-shutdown
    /// submissions into `ShuttingDown`.
    async fn admit(&self) -> Result<SemaphorePermit<'_>> {
        self.ops.acquire().await.map_err(|_| SiloError::ShuttingDown)
    }
}
