use serde::{Deserialize, Serialize};
use silo_core::{EngineConfig, Result, SiloError};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub system: SystemConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    #[serde(default = "default_io_workers")]
    pub io_workers: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: u64,
    #[serde(default = "default_max_concurrent_ops")]
    pub max_concurrent_ops: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub chunks_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            io_workers: default_io_workers(),
            batch_size: default_batch_size(),
            memory_capacity: default_memory_capacity(),
            max_concurrent_ops: default_max_concurrent_ops(),
        }
    }
}

fn default_chunk_size() -> u64 {
    1024 * 1024
}

fn default_io_workers() -> usize {
    4
}

fn default_batch_size() -> u32 {
    4
}

fn default_memory_capacity() -> u64 {
    64 * 1024 * 1024
}

fn default_max_concurrent_ops() -> usize {
    32
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(::config::Environment::with_prefix("SILO"))
            .build()
            .map_err(|e| SiloError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| SiloError::Config(e.to_string()))?;

        Ok(config)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            chunk_size: self.system.chunk_size,
            io_workers: self.system.io_workers,
            batch_size: self.system.batch_size,
            memory_capacity: self.system.memory_capacity,
            max_concurrent_ops: self.system.max_concurrent_ops,
            chunks_dir: self.storage.chunks_dir.clone(),
            output_dir: self.storage.output_dir.clone(),
        }
    }
}
