//! Metrics sinks that stay on the host

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use llmperf_bench_core::{BenchError, BenchResult, MetricsSink, PublishedMetric};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Emits every data point as a structured log event
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl MetricsSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn put_metric(&self, namespace: &str, metric: &PublishedMetric) -> BenchResult<()> {
        tracing::info!(
            target: "llmperf_bench::metrics",
            namespace,
            metric = %metric.name,
            value = metric.value,
            unit = %metric.unit,
            dimensions = %metric.dimensions,
            "metric"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    namespace: &'a str,
    #[serde(flatten)]
    metric: &'a PublishedMetric,
}

/// Appends data points to a file, one JSON object per line
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
}

impl JsonLinesSink {
    /// Open `path` for appending, creating it and its parent directory
    pub async fn open(path: impl AsRef<Path>) -> BenchResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| BenchError::metrics(format!("open {}: {e}", path.display())))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// File being written
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MetricsSink for JsonLinesSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn put_metric(&self, namespace: &str, metric: &PublishedMetric) -> BenchResult<()> {
        let mut line = serde_json::to_vec(&JsonLine { namespace, metric })?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line)
            .await
            .map_err(|e| BenchError::metrics(format!("write {}: {e}", self.path.display())))?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmperf_bench_core::Dimensions;

    fn point(concurrency: &str) -> PublishedMetric {
        PublishedMetric {
            name: "TTFT".into(),
            value: 120.5,
            unit: "Milliseconds".into(),
            dimensions: Dimensions {
                model: "m".into(),
                endpoint: "ec2".into(),
                container: "lmi".into(),
                instance_type: "g5.12xlarge".into(),
                concurrency: concurrency.into(),
            },
        }
    }

    #[tokio::test]
    async fn test_json_lines_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/metrics.jsonl");

        let sink = JsonLinesSink::open(&path).await.unwrap();
        sink.put_metric("Rubikon", &point("1")).await.unwrap();
        sink.put_metric("Rubikon", &point("2")).await.unwrap();
        drop(sink);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["namespace"], "Rubikon");
        assert_eq!(lines[0]["name"], "TTFT");
        assert_eq!(lines[1]["dimensions"]["concurrency"], "2");
    }

    #[tokio::test]
    async fn test_log_sink_accepts() {
        assert!(LogSink.put_metric("ns", &point("1")).await.is_ok());
    }
}
