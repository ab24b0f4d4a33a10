//! AWS S3 object store

use std::path::Path;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use llmperf_bench_core::{BenchError, BenchResult, ObjectStore};

/// Uploads objects with `PutObject`
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Client for `region` using the default credential chain
    pub async fn from_region(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self::from_client(Client::new(&config))
    }

    /// Wrap an existing client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    async fn put(&self, bucket: &str, key: &str, body: ByteStream) -> BenchResult<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                BenchError::storage(format!("put s3://{bucket}/{key}: {}", DisplayErrorContext(&e)))
            })?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &str {
        "s3"
    }

    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> BenchResult<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| BenchError::storage(format!("read {}: {e}", path.display())))?;
        self.put(bucket, key, body).await
    }

    async fn put_bytes(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> BenchResult<()> {
        self.put(bucket, key, ByteStream::from(bytes)).await
    }
}
