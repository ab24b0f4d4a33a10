//! Result harvesting: locate the summary artifact and upload run outputs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::BenchResult;
use crate::metrics::SummaryArtifact;
use crate::traits::ObjectStore;

/// File name suffix the load tool gives its summary artifact
pub const SUMMARY_SUFFIX: &str = "_summary.json";

/// Key layout in durable storage
///
/// ```text
/// <date>/<folder>/metrics/<result path>/<relative file>
/// <date>/<folder>/config/config.yml
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    date: String,
    folder: String,
}

impl StorageLayout {
    /// Layout for a fixed date stamp
    pub fn new(date: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            folder: folder.into(),
        }
    }

    /// Layout stamped with today's local date
    pub fn today(folder: impl Into<String>) -> Self {
        Self::new(chrono::Local::now().format("%Y-%m-%d").to_string(), folder)
    }

    /// Date stamp
    pub fn date(&self) -> &str {
        &self.date
    }

    /// Prefix of all run artifacts
    pub fn metrics_prefix(&self) -> String {
        format!("{}/{}/metrics/", self.date, self.folder)
    }

    /// Key of one artifact file
    pub fn artifact_key(&self, result_path: &str, relative: &str) -> String {
        format!("{}{}/{}", self.metrics_prefix(), result_path, relative)
    }

    /// Key of the job configuration snapshot
    pub fn config_key(&self) -> String {
        format!("{}/{}/config/config.yml", self.date, self.folder)
    }
}

/// What one harvest did
#[derive(Debug, Clone, Default)]
pub struct HarvestReport {
    /// Parsed summary, empty when none was found or it was unreadable
    pub summary: SummaryArtifact,
    /// Summary file that was parsed
    pub summary_path: Option<PathBuf>,
    /// Files uploaded
    pub uploaded: usize,
    /// Files that could not be uploaded
    pub failed: usize,
}

/// Uploads run outputs and extracts the summary artifact
pub struct ResultHarvester {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    layout: StorageLayout,
}

impl ResultHarvester {
    /// Harvester writing to `bucket` in `store`
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, layout: StorageLayout) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            layout,
        }
    }

    /// Storage layout in use
    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Upload the job document exactly as it was read
    pub async fn upload_config_snapshot(&self, raw: &[u8]) -> BenchResult<()> {
        let key = self.layout.config_key();
        self.store.put_bytes(&self.bucket, &key, raw.to_vec()).await?;
        tracing::info!(bucket = %self.bucket, key = %key, store = self.store.name(), "uploaded job config snapshot");
        Ok(())
    }

    /// Walk `output_dir`, upload every file under `result_path`, parse the summary
    ///
    /// Per-file errors are logged and skipped.
    pub async fn harvest(&self, output_dir: &Path, result_path: &str) -> HarvestReport {
        let mut report = HarvestReport::default();

        for file in collect_files(output_dir).await {
            let relative = relative_key(output_dir, &file);

            if report.summary_path.is_none()
                && file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(SUMMARY_SUFFIX))
            {
                report.summary_path = Some(file.clone());
            }

            let key = self.layout.artifact_key(result_path, &relative);
            match self.store.put_file(&self.bucket, &key, &file).await {
                Ok(()) => {
                    report.uploaded += 1;
                    tracing::debug!(file = %file.display(), key = %key, "uploaded artifact");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(file = %file.display(), key = %key, error = %e, "failed to upload artifact");
                }
            }
        }

        match &report.summary_path {
            Some(path) => match SummaryArtifact::read(path).await {
                Ok(summary) => report.summary = summary,
                Err(e) => {
                    tracing::error!(file = %path.display(), error = %e, "unreadable summary artifact");
                }
            },
            None => {
                tracing::warn!(dir = %output_dir.display(), "no summary artifact found");
            }
        }

        report
    }
}

impl std::fmt::Debug for ResultHarvester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultHarvester")
            .field("store", &self.store.name())
            .field("bucket", &self.bucket)
            .field("layout", &self.layout)
            .finish()
    }
}

/// All regular files below `root`, in sorted path order
async fn collect_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(dir = %dir.display(), error = %e, "cannot read directory");
                continue;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => match entry.file_type().await {
                    Ok(kind) if kind.is_dir() => pending.push(entry.path()),
                    Ok(kind) if kind.is_file() => files.push(entry.path()),
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(path = %entry.path().display(), error = %e, "cannot stat entry");
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(dir = %dir.display(), error = %e, "directory walk interrupted");
                    break;
                }
            }
        }
    }

    files.sort();
    files
}

/// `file` relative to `root`, `/`-separated
fn relative_key(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BenchError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        objects: Mutex<Vec<(String, String, Vec<u8>)>>,
        reject_suffix: Option<&'static str>,
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        fn name(&self) -> &str {
            "memory"
        }

        async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> BenchResult<()> {
            if self.reject_suffix.is_some_and(|s| key.ends_with(s)) {
                return Err(BenchError::storage("access denied"));
            }
            let bytes = tokio::fs::read(path).await?;
            self.put_bytes(bucket, key, bytes).await
        }

        async fn put_bytes(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> BenchResult<()> {
            self.objects
                .lock()
                .unwrap()
                .push((bucket.to_string(), key.to_string(), bytes));
            Ok(())
        }
    }

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_layout_keys() {
        let layout = StorageLayout::new("2024-05-01", "ec2");
        assert_eq!(layout.metrics_prefix(), "2024-05-01/ec2/metrics/");
        assert_eq!(
            layout.artifact_key("lmi/m-t/4", "raw/out.json"),
            "2024-05-01/ec2/metrics/lmi/m-t/4/raw/out.json"
        );
        assert_eq!(layout.config_key(), "2024-05-01/ec2/config/config.yml");
    }

    #[tokio::test]
    async fn test_harvest_preserves_nested_paths() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "m_550_150_summary.json", r#"{"results_ttft_s_mean": 0.3}"#);
        write(dir.path(), "nested/m_550_150_individual_responses.json", "[]");

        let store = Arc::new(MemoryStore::default());
        let harvester = ResultHarvester::new(
            store.clone(),
            "bucket",
            StorageLayout::new("2024-05-01", "ec2"),
        );
        let report = harvester.harvest(dir.path(), "lmi/m-t/1").await;

        assert_eq!(report.uploaded, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(report.summary.get("results_ttft_s_mean"), Some(0.3));

        let keys: Vec<_> = store
            .objects
            .lock()
            .unwrap()
            .iter()
            .map(|(_, k, _)| k.clone())
            .collect();
        assert!(keys.contains(&"2024-05-01/ec2/metrics/lmi/m-t/1/m_550_150_summary.json".to_string()));
        assert!(keys.contains(
            &"2024-05-01/ec2/metrics/lmi/m-t/1/nested/m_550_150_individual_responses.json".to_string()
        ));
    }

    #[tokio::test]
    async fn test_harvest_without_summary_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "log.txt", "nothing");

        let store = Arc::new(MemoryStore::default());
        let harvester = ResultHarvester::new(store, "bucket", StorageLayout::new("d", "f"));
        let report = harvester.harvest(dir.path(), "x/y-z/1").await;

        assert!(report.summary.is_empty());
        assert!(report.summary_path.is_none());
        assert_eq!(report.uploaded, 1);
    }

    #[tokio::test]
    async fn test_harvest_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::default());
        let harvester = ResultHarvester::new(store, "bucket", StorageLayout::new("d", "f"));
        let report = harvester.harvest(&dir.path().join("absent"), "x/y-z/1").await;

        assert!(report.summary.is_empty());
        assert_eq!(report.uploaded, 0);
    }

    #[tokio::test]
    async fn test_upload_failure_does_not_stop_harvest() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a_summary.json", r#"{"x": 1}"#);
        write(dir.path(), "b.csv", "1,2");

        let store = Arc::new(MemoryStore {
            reject_suffix: Some("b.csv"),
            ..Default::default()
        });
        let harvester = ResultHarvester::new(store, "bucket", StorageLayout::new("d", "f"));
        let report = harvester.harvest(dir.path(), "x/y-z/1").await;

        assert_eq!(report.uploaded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.summary.get("x"), Some(1.0));
    }

    #[tokio::test]
    async fn test_unparsable_summary_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a_summary.json", "{truncated");

        let store = Arc::new(MemoryStore::default());
        let harvester = ResultHarvester::new(store, "bucket", StorageLayout::new("d", "f"));
        let report = harvester.harvest(dir.path(), "x/y-z/1").await;

        assert!(report.summary_path.is_some());
        assert!(report.summary.is_empty());
    }

    #[tokio::test]
    async fn test_config_snapshot_byte_match() {
        let raw = b"region: us-west-2\n# comment kept verbatim\nbenchmarks: []\n".to_vec();
        let store = Arc::new(MemoryStore::default());
        let harvester = ResultHarvester::new(
            store.clone(),
            "bucket",
            StorageLayout::new("2024-05-01", "ec2"),
        );
        harvester.upload_config_snapshot(&raw).await.unwrap();

        let objects = store.objects.lock().unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].0, "bucket");
        assert_eq!(objects[0].1, "2024-05-01/ec2/config/config.yml");
        assert_eq!(objects[0].2, raw);
    }
}
