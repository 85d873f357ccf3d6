//! Filesystem-facing stores: the chunk staging directory and the
//! directory reconstructed objects are written to.

pub mod chunk_store;
pub mod output_store;

pub use chunk_store::{ChunkStore, chunk_key};
pub use output_store::OutputStore;
