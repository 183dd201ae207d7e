//! Object storage for recording parts. Cloud object-store SDKs are out
//! of scope here; the trait boundary is the contract, with a
//! filesystem-backed implementation for single-node clusters and tests.

use async_trait::async_trait;
use meridian_core::{ErrorKind, MeridianError};
use std::path::PathBuf;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_part(&self, key: &str, data: Vec<u8>) -> Result<(), MeridianError>;
    async fn get_part(&self, key: &str) -> Result<Vec<u8>, MeridianError>;
    async fn list_parts(&self, prefix: &str) -> Result<Vec<String>, MeridianError>;
}

pub struct FilesystemObjectStore {
    root: PathBuf,
}

impl FilesystemObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, MeridianError> {
        if key.contains("..") {
            return Err(MeridianError::invalid_argument("part key must not contain '..'"));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn put_part(&self, key: &str, data: Vec<u8>) -> Result<(), MeridianError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| MeridianError::with_source(ErrorKind::Unavailable, "create recording part directory", e))?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| MeridianError::with_source(ErrorKind::Unavailable, "write recording part", e))
    }

    async fn get_part(&self, key: &str) -> Result<Vec<u8>, MeridianError> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MeridianError::not_found(format!("recording part {key} not found"))
            } else {
                MeridianError::with_source(ErrorKind::Unavailable, "read recording part", e)
            }
        })
    }

    async fn list_parts(&self, prefix: &str) -> Result<Vec<String>, MeridianError> {
        let dir = self.path_for(prefix)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MeridianError::with_source(ErrorKind::Unavailable, "list recording parts", e)),
        };
        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MeridianError::with_source(ErrorKind::Unavailable, "list recording parts", e))?
        {
            if let Some(name) = entry.file_name().to_str() {
                keys.push(format!("{prefix}/{name}"));
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemObjectStore::new(dir.path());
        store.put_part("sess/part-000000", b"hello".to_vec()).await.unwrap();
        let data = store.get_part("sess/part-000000").await.unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn missing_part_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemObjectStore::new(dir.path());
        let err = store.get_part("sess/part-000099").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn list_parts_returns_sorted_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemObjectStore::new(dir.path());
        store.put_part("sess/part-000001", b"b".to_vec()).await.unwrap();
        store.put_part("sess/part-000000", b"a".to_vec()).await.unwrap();
        let keys = store.list_parts("sess").await.unwrap();
        assert_eq!(keys, vec!["sess/part-000000", "sess/part-000001"]);
    }
}
