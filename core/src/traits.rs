//! Core traits for the host collaborators and result sinks
//!
//! These traits are defined in core so the orchestrator can be driven by
//! mocks in tests. Implementations live in their respective crates
//! (host/, storage/, report/).

use std::path::Path;

use async_trait::async_trait;

use crate::config::{ContainerSpec, Credential};
use crate::context::{ContainerHandle, TeardownScope};
use crate::error::BenchResult;
use crate::metrics::PublishedMetric;

// ============================================================================
// Host collaborators
// ============================================================================

/// Confirms the host exposes the accelerator class a container needs
#[async_trait]
pub trait DeviceProbe: Send + Sync {
    /// Whether `device` (`gpu`, `neuron`) is usable on this host
    ///
    /// Unsupported classes and probe failures are reported as unfit, never as
    /// errors.
    async fn is_fit(&self, device: &str) -> bool;
}

/// Makes a container image available locally
#[async_trait]
pub trait ImageProvisioner: Send + Sync {
    /// Pull or verify `image`
    async fn ensure_image(&self, image: &str) -> BenchResult<()>;
}

/// Everything needed to start one inference server container
#[derive(Debug, Clone, Copy)]
pub struct LaunchRequest<'a> {
    /// Name the container is started under
    pub handle: &'a ContainerHandle,
    /// Image and parameters
    pub spec: &'a ContainerSpec,
    /// Model the server loads
    pub model: &'a str,
    /// Model hub token
    pub credential: &'a Credential,
}

/// Starts and removes inference server containers
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Start the container described by `request`
    async fn launch(&self, request: &LaunchRequest<'_>) -> BenchResult<()>;

    /// Remove the container(s) covered by `scope`
    async fn shutdown(&self, handle: &ContainerHandle, scope: TeardownScope) -> BenchResult<()>;
}

/// Parameters of a measurement pass
#[derive(Debug, Clone, Copy)]
pub struct MeasureRequest<'a> {
    /// Model served by the running container
    pub model: &'a str,
    /// Concurrent simulated clients
    pub concurrency: u32,
    /// Flags passed through to the load tool
    pub extra_flags: &'a [String],
    /// Directory the load tool writes its results to
    pub output_dir: &'a Path,
}

/// Drives the external load generation tool
#[async_trait]
pub trait LoadGenerator: Send + Sync {
    /// Short fixed-profile pass that primes the server; output is discarded
    async fn warmup(&self, model: &str) -> BenchResult<()>;

    /// The measurement pass
    async fn measure(&self, request: &MeasureRequest<'_>) -> BenchResult<()>;
}

// ============================================================================
// Result sinks
// ============================================================================

/// Durable object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend identifier (e.g., "s3", "local")
    fn name(&self) -> &str;

    /// Upload a local file
    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> BenchResult<()>;

    /// Upload an in-memory object
    async fn put_bytes(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> BenchResult<()>;
}

/// Metrics backend
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Backend identifier (e.g., "cloudwatch", "log")
    fn name(&self) -> &str;

    /// Emit one data point under `namespace`
    async fn put_metric(&self, namespace: &str, metric: &PublishedMetric) -> BenchResult<()>;
}
