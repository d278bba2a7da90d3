use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{KeyValueStore, StoreError};

/// Directory-backed store: one `<key>.json` file per entry.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| StoreError::Io {
                key: root.display().to_string(),
                source,
            })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        tokio::fs::write(self.path_for(key), value)
            .await
            .map_err(|source| StoreError::Io {
                key: key.to_string(),
                source,
            })
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::open(dir.path()).await.unwrap();
            store.set("cartData", "{}".into()).await.unwrap();
        }

        let store = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get("cartData").await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn missing_key_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        assert!(store.get("orders").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_deletes_file_and_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.set("orders", "[]".into()).await.unwrap();

        store.remove("orders").await.unwrap();
        store.remove("orders").await.unwrap();

        assert!(!dir.path().join("orders.json").exists());
    }

    #[tokio::test]
    async fn open_creates_nested_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FileStore::open(&nested).await.unwrap();
        assert_eq!(store.root(), nested.as_path());
        assert!(nested.is_dir());
    }
}
