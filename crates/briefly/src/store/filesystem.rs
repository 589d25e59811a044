use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::StoreError;

use super::ObjectStore;

/// Object store laid out on the local filesystem as `<root>/<bucket>/<key>`.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `bucket/key` to a path below the root, refusing anything
    /// that could escape it.
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let mut path = self.root.clone();
        for part in [bucket, key] {
            let relative = Path::new(part);
            if part.is_empty()
                || relative
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_)))
            {
                return Err(StoreError::InvalidKey(format!("{}/{}", bucket, key)));
            }
            path.push(relative);
        }
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, StoreError> {
        let path = self.object_path(bucket, key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::Io { path, source: e })
    }

    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(StoreError::Io { path, source: e }),
        }
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        // Write next to the target and rename so readers never observe a
        // half-written object.
        let staging = path.with_extension(format!("part-{}", uuid::Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&staging, &bytes).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(StoreError::Io {
                path: staging,
                source: e,
            });
        }
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(StoreError::Io { path, source: e });
        }

        tracing::debug!(bucket, key, content_type, size = bytes.len(), "stored object");
        Ok(key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_then_exists_and_fetch() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path());

        assert!(!store.exists("bucket", "youtube/a.wav").await.unwrap());

        let key = store
            .put("bucket", "youtube/a.wav", b"RIFF".to_vec(), "audio/wav")
            .await
            .unwrap();
        assert_eq!(key, "youtube/a.wav");
        assert!(store.exists("bucket", "youtube/a.wav").await.unwrap());
        assert_eq!(store.fetch("bucket", "youtube/a.wav").await.unwrap(), b"RIFF");
        assert!(dir.path().join("bucket/youtube/a.wav").is_file());
    }

    #[tokio::test]
    async fn test_put_overwrites_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path());

        store.put("b", "k.txt", b"one".to_vec(), "text/plain").await.unwrap();
        store.put("b", "k.txt", b"two".to_vec(), "text/plain").await.unwrap();

        assert_eq!(store.fetch("b", "k.txt").await.unwrap(), b"two");
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("b")).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path());

        match store.fetch("b", "missing.pdf").await {
            Err(StoreError::NotFound { bucket, key }) => {
                assert_eq!(bucket, "b");
                assert_eq!(key, "missing.pdf");
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path());

        for key in ["../evil", "/etc/passwd", "a/../../b", ""] {
            let result = store.put("b", key, vec![1], "application/octet-stream").await;
            assert!(
                matches!(result, Err(StoreError::InvalidKey(_))),
                "key {:?} should be rejected",
                key
            );
        }
        assert!(matches!(
            store.exists("..", "k").await,
            Err(StoreError::InvalidKey(_))
        ));
    }
}
