//! Silo Core - engine for single-node chunked object storage
//!
//! Splits arbitrary files into fixed-size chunks, persists each chunk
//! zlib-compressed and SHA256 content-hashed, and reassembles chunks on
//! demand, using:
//! - a bounded worker pool for parallel chunk I/O
//! - blocking memory admission control for in-flight chunk data
//! - one exclusive lock per object, serializing its full lifecycle
//! - an in-memory metadata registry whose consistency survives partial
//!   failures across concurrent operations

pub mod budget;
pub mod codec;
pub mod engine;
pub mod error;
pub mod locks;
pub mod operations;
pub mod pool;
pub mod registry;
pub mod storage;

pub use budget::MemoryBudget;
pub use codec::{compute_hash, decode, encode};
pub use engine::{Engine, EngineConfig};
pub use error::{Result, SiloError};
pub use locks::ObjectLocks;
pub use operations::{
    DeleteObjectOperation, DeleteObjectOperationOutcome, DeleteObjectOperationRequest,
    GetObjectOperation, GetObjectOperationOutcome, GetObjectOperationRequest,
    GetObjectOperationResult, ListObjectItem, ListObjectsOperation, ListObjectsOperationResult,
    PutObjectOperation, PutObjectOperationRequest, PutObjectOperationResult,
};
pub use pool::IoPool;
pub use registry::{ChunkRecord, ObjectRecord, Registry};
pub use storage::{ChunkStore, OutputStore, chunk_key};
