//! Filesystem-backed object store

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use llmperf_bench_core::{BenchError, BenchResult, ObjectStore};

/// Stores objects as files under `<root>/<bucket>/<key>`
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination of `key` in `bucket`
    ///
    /// Keys may not climb out of the bucket directory.
    pub fn object_path(&self, bucket: &str, key: &str) -> BenchResult<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if bucket.is_empty() || key.is_empty() || escapes {
            return Err(BenchError::storage(format!("invalid object key {bucket}/{key}")));
        }
        Ok(self.root.join(bucket).join(relative))
    }

    async fn prepare(&self, bucket: &str, key: &str) -> BenchResult<PathBuf> {
        let dest = self.object_path(bucket, key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(dest)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> BenchResult<()> {
        let dest = self.prepare(bucket, key).await?;
        tokio::fs::copy(path, &dest).await.map_err(|e| {
            BenchError::storage(format!("copy {} -> {}: {e}", path.display(), dest.display()))
        })?;
        Ok(())
    }

    async fn put_bytes(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> BenchResult<()> {
        let dest = self.prepare(bucket, key).await?;
        tokio::fs::write(&dest, bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_file_creates_nested_key() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("source.json");
        std::fs::write(&src, "{}").unwrap();

        let store = LocalStore::new(root.path().join("store"));
        store
            .put_file("bucket", "2024-05-01/ec2/metrics/lmi/m-t/1/a_summary.json", &src)
            .await
            .unwrap();

        let dest = root
            .path()
            .join("store/bucket/2024-05-01/ec2/metrics/lmi/m-t/1/a_summary.json");
        assert_eq!(std::fs::read_to_string(dest).unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_put_bytes_overwrites() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path());
        store.put_bytes("b", "config/config.yml", b"one".to_vec()).await.unwrap();
        store.put_bytes("b", "config/config.yml", b"two".to_vec()).await.unwrap();

        assert_eq!(std::fs::read(root.path().join("b/config/config.yml")).unwrap(), b"two");
    }

    #[test]
    fn test_rejects_escaping_keys() {
        let store = LocalStore::new("/tmp/store");
        assert!(store.object_path("b", "../etc/passwd").is_err());
        assert!(store.object_path("b", "/abs").is_err());
        assert!(store.object_path("", "k").is_err());
        assert!(store.object_path("b", "a/b/c").is_ok());
    }

    #[tokio::test]
    async fn test_missing_source_is_storage_error() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalStore::new(root.path());
        let err = store
            .put_file("b", "k", &root.path().join("absent"))
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::Storage(_)));
    }
}
