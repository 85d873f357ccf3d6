use crate::error::Result;
use crate::storage::chunk_store::purge_directory;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

/// OutputStore owns the directory reconstructed objects are written to,
/// kept separate from the chunk staging directory.
pub struct OutputStore {
    base_path: PathBuf,
    sequence: AtomicU64,
}

impl OutputStore {
    pub fn new(base_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            sequence: AtomicU64::new(0),
        })
    }

    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    /// Create a fresh output file for a reconstruction of `object_id`,
    /// named with the id, a creation timestamp and a per-store sequence
    /// number. The sequence keeps names unique even when several
    /// reconstructions of one object land in the same millisecond.
    pub async fn create(&self, object_id: u64) -> Result<(PathBuf, fs::File)> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "object_{}_{}_{}",
            object_id,
            chrono::Utc::now().timestamp_millis(),
            sequence
        );
        let path = self.base_path.join(name);
        let file = fs::File::create(&path).await?;
        Ok((path, file))
    }

    /// Remove every output file in the directory.
    pub async fn purge(&self) -> Result<()> {
        purge_directory(&self.base_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_create_and_purge() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(temp_dir.path().to_path_buf()).unwrap();

        let (path, mut file) = store.create(42).await.unwrap();
        file.write_all(b"reconstructed").await.unwrap();
        file.flush().await.unwrap();
        drop(file);

        assert!(path.is_file());
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("object_42_"));

        store.purge().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_repeated_creates_never_collide() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(temp_dir.path().to_path_buf()).unwrap();

        // Many creates for the same object land well inside one
        // millisecond; every one must still get its own file.
        let mut paths = HashSet::new();
        for _ in 0..50 {
            let (path, _file) = store.create(7).await.unwrap();
            paths.insert(path);
        }
        assert_eq!(paths.len(), 50);
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 50);
    }
}
