//! Builder pattern for Orchestrator construction

use std::sync::Arc;

use indicatif::ProgressBar;

use crate::config::{Credential, JobDescriptor};
use crate::error::{BenchError, BenchResult};
use crate::harvest::{ResultHarvester, StorageLayout};
use crate::metrics::MetricsPublisher;
use crate::traits::{
    ContainerRuntime, DeviceProbe, ImageProvisioner, LoadGenerator, MetricsSink, ObjectStore,
};

use super::executor::{Orchestrator, RunOptions};

/// Builder for creating an Orchestrator from a job and its collaborators
///
/// # Example
///
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new(loaded.descriptor)
///     .credential(Credential::from_env())
///     .device_probe(Arc::new(DeviceValidator::new(runner.clone())))
///     .images(docker.clone())
///     .runtime(docker)
///     .load_generator(Arc::new(driver))
///     .object_store(store)
///     .metrics_sink(sink)
///     .config_snapshot(loaded.raw)
///     .build()?;
///
/// let report = orchestrator.run().await;
/// ```
pub struct OrchestratorBuilder {
    job: JobDescriptor,
    options: RunOptions,
    credential: Credential,
    devices: Option<Arc<dyn DeviceProbe>>,
    images: Option<Arc<dyn ImageProvisioner>>,
    runtime: Option<Arc<dyn ContainerRuntime>>,
    load: Option<Arc<dyn LoadGenerator>>,
    store: Option<Arc<dyn ObjectStore>>,
    sink: Option<Arc<dyn MetricsSink>>,
    layout: Option<StorageLayout>,
    snapshot: Option<Vec<u8>>,
    progress: Option<ProgressBar>,
}

impl OrchestratorBuilder {
    /// Create a builder for `job`
    pub fn new(job: JobDescriptor) -> Self {
        Self {
            job,
            options: RunOptions::default(),
            credential: Credential::default(),
            devices: None,
            images: None,
            runtime: None,
            load: None,
            store: None,
            sink: None,
            layout: None,
            snapshot: None,
            progress: None,
        }
    }

    /// Set the model hub token passed to launched containers
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }

    /// Set the run options
    pub fn options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the device probe
    pub fn device_probe(mut self, probe: Arc<dyn DeviceProbe>) -> Self {
        self.devices = Some(probe);
        self
    }

    /// Set the image provisioner
    pub fn images(mut self, images: Arc<dyn ImageProvisioner>) -> Self {
        self.images = Some(images);
        self
    }

    /// Set the container runtime
    pub fn runtime(mut self, runtime: Arc<dyn ContainerRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Set the load generator
    pub fn load_generator(mut self, load: Arc<dyn LoadGenerator>) -> Self {
        self.load = Some(load);
        self
    }

    /// Set the durable object store
    pub fn object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the metrics sink
    pub fn metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Override the storage layout (defaults to today's date and `s3.folder`)
    pub fn layout(mut self, layout: StorageLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Raw job document uploaded once before the first combination
    pub fn config_snapshot(mut self, raw: Vec<u8>) -> Self {
        self.snapshot = Some(raw);
        self
    }

    /// Progress bar advanced once per combination
    pub fn progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    ///
    /// Returns an error if a collaborator is missing or the job fails
    /// validation.
    ///
    /// A relative `results_root` is resolved against the current directory so
    /// a load generator running from another working directory writes where
    /// the harvester looks.
    pub fn build(self) -> BenchResult<Orchestrator> {
        let devices = self
            .devices
            .ok_or_else(|| BenchError::missing_config("device probe"))?;
        let images = self
            .images
            .ok_or_else(|| BenchError::missing_config("image provisioner"))?;
        let runtime = self
            .runtime
            .ok_or_else(|| BenchError::missing_config("container runtime"))?;
        let load = self
            .load
            .ok_or_else(|| BenchError::missing_config("load generator"))?;
        let store = self
            .store
            .ok_or_else(|| BenchError::missing_config("object store"))?;
        let sink = self
            .sink
            .ok_or_else(|| BenchError::missing_config("metrics sink"))?;

        self.job.validate()?;

        let mut options = self.options;
        if options.results_root.is_relative() {
            options.results_root = std::env::current_dir()?.join(&options.results_root);
        }

        if self.credential.is_empty() {
            tracing::warn!("model hub token is empty; gated models will fail to load");
        }

        let layout = self
            .layout
            .unwrap_or_else(|| StorageLayout::today(self.job.s3.folder.clone()));
        let harvester = ResultHarvester::new(store, self.job.s3.bucket_name.clone(), layout);
        let publisher = MetricsPublisher::new(
            sink,
            self.job.cloudwatch.metrics_namespace.clone(),
            self.job.metrics.clone(),
        );

        Ok(Orchestrator {
            job: self.job,
            options,
            credential: self.credential,
            devices,
            images,
            runtime,
            load,
            harvester,
            publisher,
            snapshot: self.snapshot,
            progress: self.progress.unwrap_or_else(ProgressBar::hidden),
        })
    }
}
