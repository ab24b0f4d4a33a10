//! Job configuration types
//!
//! A job document describes the whole run: where results go, which summary
//! fields become metrics, and the nested benchmarks -> tests -> containers
//! matrix to execute. It is loaded once and never mutated afterwards.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult};
use crate::plan::result_path;

/// Region used when the job document does not name one
pub const DEFAULT_REGION: &str = "us-west-2";
/// Metrics namespace used when `cloudwatch.metrics_namespace` is absent
pub const DEFAULT_NAMESPACE: &str = "Rubikon";
/// Bucket used when `s3.bucket_name` is absent
pub const DEFAULT_BUCKET: &str = "djl-benchmark-llm";
/// Folder used when `s3.folder` is absent
pub const DEFAULT_FOLDER: &str = "ec2";
/// Endpoint dimension attached to every published metric
pub const DEFAULT_ENDPOINT: &str = "ec2";
/// Environment variable holding the model hub token
pub const CREDENTIAL_ENV: &str = "HF_TOKEN";

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

/// The full run description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Cloud region for storage and metrics clients
    #[serde(default = "default_region")]
    pub region: String,

    /// Metrics backend settings
    #[serde(default)]
    pub cloudwatch: MetricsBackendConfig,

    /// Summary field name -> backend metric
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricSpec>,

    /// Durable storage settings
    #[serde(default)]
    pub s3: StorageConfig,

    /// Endpoint dimension value
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Load generator invocation settings
    #[serde(default)]
    pub llmperf: LlmPerfSettings,

    /// Ordered benchmarks, one per model
    #[serde(default)]
    pub benchmarks: Vec<BenchmarkSpec>,
}

/// `cloudwatch:` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsBackendConfig {
    /// Namespace all data points are written under
    #[serde(default = "MetricsBackendConfig::default_namespace")]
    pub metrics_namespace: String,
}

impl MetricsBackendConfig {
    fn default_namespace() -> String {
        DEFAULT_NAMESPACE.to_string()
    }
}

impl Default for MetricsBackendConfig {
    fn default() -> Self {
        Self {
            metrics_namespace: Self::default_namespace(),
        }
    }
}

/// `s3:` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket receiving run artifacts and the config snapshot
    #[serde(default = "StorageConfig::default_bucket")]
    pub bucket_name: String,

    /// Folder below the date prefix
    #[serde(default = "StorageConfig::default_folder")]
    pub folder: String,
}

impl StorageConfig {
    fn default_bucket() -> String {
        DEFAULT_BUCKET.to_string()
    }

    fn default_folder() -> String {
        DEFAULT_FOLDER.to_string()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket_name: Self::default_bucket(),
            folder: Self::default_folder(),
        }
    }
}

/// Backend name and unit for one summary field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Metric name in the backend
    pub metric_name: String,
    /// Backend unit, e.g. `Milliseconds`
    #[serde(default = "MetricSpec::default_unit")]
    pub unit: String,
}

impl MetricSpec {
    fn default_unit() -> String {
        "None".to_string()
    }
}

/// One model and its tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkSpec {
    /// Model identifier passed to the server and the load tool
    pub model: String,
    /// Ordered tests
    #[serde(default)]
    pub tests: Vec<TestSpec>,
}

/// One named test: a set of containers driven with the same load parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Test name, part of the output directory
    pub test_name: String,
    /// Ordered containers
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
    /// Load generator parameters
    pub llmperf_parameters: LlmPerfParameters,
}

/// An inference server container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Enable flag; disabled containers are never touched
    pub action: bool,
    /// Declared device class (`gpu` or `neuron`)
    #[serde(default)]
    pub device: String,
    /// Image reference
    #[serde(default)]
    pub image: String,
    /// Logical container name
    #[serde(default)]
    pub container: String,
    /// Flags for `docker run`, placed before the image
    ///
    /// `--name <handle> -d` is always appended after these, so a `--name` or
    /// `-d` given here is overridden by the generated container handle.
    #[serde(default)]
    pub docker_parameters: Vec<String>,
    /// Flags for the server entrypoint, placed after the model
    #[serde(default)]
    pub server_parameters: Vec<String>,
}

impl ContainerSpec {
    /// Parsed device class, `None` when unsupported
    pub fn device_class(&self) -> Option<DeviceClass> {
        self.device.parse().ok()
    }
}

/// `llmperf_parameters:` of a test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmPerfParameters {
    /// Concurrency levels, one combination each
    #[serde(rename = "num-concurrent-requests-list")]
    pub concurrency: Vec<u32>,
    /// Extra flags passed verbatim to the measurement pass
    #[serde(default, alias = "extra_parameters")]
    pub others: Vec<String>,
}

/// Accelerator family a container needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// NVIDIA GPUs
    Gpu,
    /// AWS Inferentia / Trainium
    Neuron,
}

impl std::str::FromStr for DeviceClass {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gpu" => Ok(DeviceClass::Gpu),
            "neuron" => Ok(DeviceClass::Neuron),
            other => Err(BenchError::config(format!("unsupported device: {other}"))),
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::Gpu => f.write_str("gpu"),
            DeviceClass::Neuron => f.write_str("neuron"),
        }
    }
}

/// `llmperf:` section; how the load tool is invoked
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmPerfSettings {
    /// Interpreter
    pub python: String,
    /// Benchmark script
    pub script: String,
    /// `--llm-api` value
    pub llm_api: String,
    /// Warmup profile
    pub warmup: WarmupProfile,
}

impl Default for LlmPerfSettings {
    fn default() -> Self {
        Self {
            python: "python".to_string(),
            script: "token_benchmark_ray.py".to_string(),
            llm_api: "openai".to_string(),
            warmup: WarmupProfile::default(),
        }
    }
}

/// Fixed small load profile used to prime a freshly started server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmupProfile {
    /// `--mean-input-tokens`
    pub mean_input_tokens: u32,
    /// `--stddev-input-tokens`
    pub stddev_input_tokens: u32,
    /// `--mean-output-tokens`
    pub mean_output_tokens: u32,
    /// `--stddev-output-tokens`
    pub stddev_output_tokens: u32,
    /// `--max-num-completed-requests`
    pub max_num_completed_requests: u32,
    /// `--timeout`, seconds
    pub timeout_secs: u64,
    /// `--num-concurrent-requests`
    pub concurrency: u32,
}

impl Default for WarmupProfile {
    fn default() -> Self {
        Self {
            mean_input_tokens: 550,
            stddev_input_tokens: 150,
            mean_output_tokens: 150,
            stddev_output_tokens: 10,
            max_num_completed_requests: 50,
            timeout_secs: 600,
            concurrency: 1,
        }
    }
}

/// A job document together with the exact bytes it was parsed from
#[derive(Debug, Clone)]
pub struct LoadedJob {
    /// Parsed and validated descriptor
    pub descriptor: JobDescriptor,
    /// File contents, uploaded unchanged as the config snapshot
    pub raw: Vec<u8>,
    /// Where it was read from
    pub path: PathBuf,
}

impl JobDescriptor {
    /// Read, parse and validate a job document
    pub fn load(path: impl AsRef<Path>) -> BenchResult<LoadedJob> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|e| {
            BenchError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let descriptor = Self::from_yaml_slice(&raw)?;
        descriptor.validate()?;
        Ok(LoadedJob {
            descriptor,
            raw,
            path: path.to_path_buf(),
        })
    }

    /// Parse a job document without validating it
    pub fn from_yaml_slice(raw: &[u8]) -> BenchResult<Self> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(ConfigError::Empty.into());
        }
        let value: serde_yaml::Value = serde_yaml::from_slice(raw)?;
        if value.is_null() {
            return Err(ConfigError::Empty.into());
        }
        Ok(serde_yaml::from_value(value)?)
    }

    /// Validate the descriptor
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.benchmarks.is_empty() {
            return Err(ConfigError::NoBenchmarks);
        }

        for (name, spec) in &self.metrics {
            if spec.metric_name.trim().is_empty() {
                return Err(ConfigError::InvalidMetric(name.clone()));
            }
        }

        let mut seen = HashSet::new();
        for benchmark in &self.benchmarks {
            if benchmark.model.trim().is_empty() {
                return Err(ConfigError::MissingField("benchmarks[].model"));
            }
            for test in &benchmark.tests {
                if test.test_name.trim().is_empty() {
                    return Err(ConfigError::MissingField("tests[].test_name"));
                }
                let enabled: Vec<_> = test.containers.iter().filter(|c| c.action).collect();
                if enabled.is_empty() {
                    continue;
                }
                if test.llmperf_parameters.concurrency.is_empty() {
                    return Err(ConfigError::InvalidConcurrency(format!(
                        "test {} has no concurrency levels",
                        test.test_name
                    )));
                }
                if test.llmperf_parameters.concurrency.contains(&0) {
                    return Err(ConfigError::InvalidConcurrency(format!(
                        "test {} lists a concurrency of 0",
                        test.test_name
                    )));
                }
                for container in enabled {
                    if container.device.trim().is_empty() {
                        return Err(ConfigError::MissingField("containers[].device"));
                    }
                    if container.image.trim().is_empty() {
                        return Err(ConfigError::MissingField("containers[].image"));
                    }
                    if container.container.trim().is_empty() {
                        return Err(ConfigError::MissingField("containers[].container"));
                    }
                    for &concurrency in &test.llmperf_parameters.concurrency {
                        let path = result_path(
                            &container.container,
                            &benchmark.model,
                            &test.test_name,
                            concurrency,
                        );
                        if !seen.insert(path.clone()) {
                            return Err(ConfigError::DuplicateOutput(path));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document is empty or `null`
    #[error("job document is empty")]
    Empty,

    /// No benchmarks listed
    #[error("job document lists no benchmarks")]
    NoBenchmarks,

    /// A required field is missing or blank
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Bad concurrency list
    #[error("invalid concurrency: {0}")]
    InvalidConcurrency(String),

    /// A metric entry without a backend name
    #[error("metric {0} has no metric_name")]
    InvalidMetric(String),

    /// Two combinations would write to the same output directory
    #[error("two combinations share the output directory {0}")]
    DuplicateOutput(String),
}

impl From<ConfigError> for BenchError {
    fn from(e: ConfigError) -> Self {
        BenchError::config(e.to_string())
    }
}

/// Model hub token injected into every container launch
///
/// Never printed: `Debug` and `Display` are redacted.
#[derive(Clone, Default)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Read `HF_TOKEN`, empty when unset
    pub fn from_env() -> Self {
        Self(std::env::var(CREDENTIAL_ENV).unwrap_or_default())
    }

    /// The raw token, for handing to a child process environment
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether a token is present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}
