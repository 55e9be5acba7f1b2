//! Object storage for chat attachments.
//!
//! Objects live on disk under `<base>/<bucket>/<uuid>/<file name>` and are
//! addressed by `(bucket, path)`. Each upload gets a fresh UUID directory so
//! two files with the same name never collide.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: String,
    /// Path inside the bucket, `<uuid>/<file name>`.
    pub path: String,
    pub public_url: String,
    pub size: u64,
    /// BLAKE3 hash of the content (hex).
    pub hash: String,
}

#[derive(Debug, Clone)]
pub struct BucketStore {
    base_path: PathBuf,
    public_base_url: String,
    max_size: usize,
}

/// Verify that a resolved path stays within the expected base directory.
fn ensure_within(base: &Path, relative: &Path) -> Result<PathBuf> {
    let mut resolved = base.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::CurDir => {}
            _ => return Err(StoreError::Forbidden("Path traversal detected".to_string())),
        }
    }
    Ok(resolved)
}

fn validate_bucket(bucket: &str) -> Result<()> {
    let valid = !bucket.is_empty()
        && bucket
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::Storage(format!("Invalid bucket name '{bucket}'")))
    }
}

/// Keep the last path segment of a client-supplied name and drop anything
/// that could escape the object directory.
fn sanitize_file_name(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .trim_start_matches('.')
        .to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

impl BucketStore {
    pub async fn new(
        base_path: PathBuf,
        public_base_url: impl Into<String>,
        max_size: usize,
    ) -> Result<Self> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            StoreError::Storage(format!(
                "Failed to create storage directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Object storage initialized");

        Ok(Self {
            base_path,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Public URL under which `path` in `bucket` is served.
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, bucket, path)
    }

    pub async fn upload(&self, bucket: &str, file_name: &str, data: &[u8]) -> Result<StoredObject> {
        validate_bucket(bucket)?;
        if data.is_empty() {
            return Err(StoreError::Storage("Empty object".to_string()));
        }
        if data.len() > self.max_size {
            return Err(StoreError::ObjectTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let path = format!("{}/{}", Uuid::new_v4(), sanitize_file_name(file_name));
        let target = self.object_path(bucket, &path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Storage(format!("Failed to create {path}: {e}")))?;
        }

        fs::write(&target, data)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to write {path}: {e}")))?;

        let hash = blake3::hash(data).to_hex().to_string();
        debug!(bucket, path = %path, size = data.len(), "Stored object");

        Ok(StoredObject {
            bucket: bucket.to_string(),
            public_url: self.public_url(bucket, &path),
            path,
            size: data.len() as u64,
            hash,
        })
    }

    pub async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        let target = self.object_path(bucket, path)?;
        if !fs::try_exists(&target).await.unwrap_or(false) {
            return Err(StoreError::NotFound);
        }
        fs::read(&target)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to read {path}: {e}")))
    }

    pub async fn remove(&self, bucket: &str, path: &str) -> Result<()> {
        let target = self.object_path(bucket, path)?;
        if !fs::try_exists(&target).await.unwrap_or(false) {
            return Err(StoreError::NotFound);
        }
        fs::remove_file(&target)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to delete {path}: {e}")))?;
        debug!(bucket, path, "Deleted object");
        Ok(())
    }

    fn object_path(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        validate_bucket(bucket)?;
        ensure_within(&self.base_path.join(bucket), Path::new(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store(max: usize) -> (BucketStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = BucketStore::new(dir.path().to_path_buf(), "http://localhost:9000/storage/", max)
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_upload_and_download() {
        let (store, _dir) = test_store(1024).await;
        let object = store.upload("chat-files", "notes.txt", b"hello").await.unwrap();

        assert!(object.path.ends_with("/notes.txt"));
        assert_eq!(
            object.public_url,
            format!("http://localhost:9000/storage/chat-files/{}", object.path)
        );
        assert_eq!(object.hash, blake3::hash(b"hello").to_hex().to_string());
        assert_eq!(store.download("chat-files", &object.path).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_too_large_rejected() {
        let (store, _dir) = test_store(4).await;
        let err = store.upload("chat-images", "a.png", b"12345").await.unwrap_err();
        assert!(matches!(err, StoreError::ObjectTooLarge { size: 5, max: 4 }));
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let (store, _dir) = test_store(1024).await;
        assert!(store.download("chat-files", "../../etc/passwd").await.is_err());
        assert!(store.upload("../x", "a", b"1").await.is_err());

        let object = store.upload("chat-files", "../../evil.sh", b"1").await.unwrap();
        assert!(object.path.ends_with("/evil.sh"));
    }

    #[tokio::test]
    async fn test_remove() {
        let (store, _dir) = test_store(1024).await;
        let object = store.upload("chat-files", "x.bin", b"data").await.unwrap();
        store.remove("chat-files", &object.path).await.unwrap();
        assert!(matches!(
            store.download("chat-files", &object.path).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_empty_object_rejected() {
        let (store, _dir) = test_store(1024).await;
        assert!(store.upload("chat-files", "empty", b"").await.is_err());
    }
}
