use crate::error::Result;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Build the backing-store key for chunk `index` of object `object_id`.
pub fn chunk_key(object_id: u64, index: u32) -> String {
    format!("{}_{}", object_id, index)
}

/// ChunkStore persists encoded chunks as flat files under the staging
/// directory, one `{key}.dat` file per chunk.
pub struct ChunkStore {
    base_path: PathBuf,
}

impl ChunkStore {
    pub fn new(base_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    /// Get the base path for the store
    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    /// Persist a chunk under `key`.
    /// Write to a temporary file first, then rename for atomicity.
    pub async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let chunk_path = self.chunk_path(key);

        let temp_path = chunk_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &chunk_path).await?;

        tracing::debug!("stored chunk {} ({} bytes)", key, data.len());
        Ok(())
    }

    /// Load a chunk by key; `None` means the key is absent.
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let chunk_path = self.chunk_path(key);

        if !chunk_path.exists() {
            return Ok(None);
        }

        let data = fs::read(&chunk_path).await?;
        Ok(Some(Bytes::from(data)))
    }

    /// Check if a chunk exists
    pub fn exists(&self, key: &str) -> bool {
        self.chunk_path(key).exists()
    }

    /// Remove a chunk. Returns `false` when the key was absent or the
    /// file could not be removed.
    pub async fn delete(&self, key: &str) -> bool {
        let chunk_path = self.chunk_path(key);
        if !chunk_path.is_file() {
            return false;
        }
        fs::remove_file(&chunk_path).await.is_ok()
    }

    /// Remove every chunk file in the staging directory.
    pub async fn purge(&self) -> Result<()> {
        purge_directory(&self.base_path).await
    }

    fn chunk_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.dat", key))
    }
}

/// Delete regular files directly under `dir`, leaving anything else in
/// place with a log line.
pub(crate) async fn purge_directory(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        tracing::warn!("purge skipped, directory does not exist: {:?}", dir);
        return Ok(());
    }

    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() {
            fs::remove_file(&path).await?;
        } else {
            tracing::warn!("skipping non-file during purge: {:?}", path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chunk_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(temp_dir.path().to_path_buf()).unwrap();

        let key = chunk_key(7, 0);
        let data = Bytes::from("compressed chunk payload");

        store.put(&key, data.clone()).await.unwrap();
        assert!(store.exists(&key));

        let loaded = store.get(&key).await.unwrap().unwrap();
        assert_eq!(loaded, data);

        assert!(store.delete(&key).await);
        assert!(!store.exists(&key));

        // Deleting an absent key reports failure instead of erroring.
        assert!(!store.delete(&key).await);
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_removes_files_only() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(temp_dir.path().to_path_buf()).unwrap();

        store.put(&chunk_key(1, 0), Bytes::from("a")).await.unwrap();
        store.put(&chunk_key(1, 1), Bytes::from("b")).await.unwrap();
        std::fs::create_dir(temp_dir.path().join("subdir")).unwrap();

        store.purge().await.unwrap();

        assert!(!store.exists(&chunk_key(1, 0)));
        assert!(!store.exists(&chunk_key(1, 1)));
        assert!(temp_dir.path().join("subdir").is_dir());
    }

    #[test]
    fn test_chunk_key_format() {
        assert_eq!(chunk_key(3, 12), "3_12");
    }
}
