//! llmperf-bench-core: Job model and orchestration for inference server benchmarks
//!
//! This crate provides the pieces every llmperf-bench component shares:
//!
//! - Job document types and validation
//! - Combination planning and per-combination state
//! - Core traits for host collaborators and result sinks
//! - Result harvesting and metric publication
//! - The orchestrator that ties them together
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod error;
pub mod harvest;
pub mod metrics;
pub mod orchestrator;
pub mod plan;
pub mod traits;

pub use config::{
    BenchmarkSpec, ConfigError, ContainerSpec, Credential, DeviceClass, JobDescriptor,
    LlmPerfParameters, LlmPerfSettings, LoadedJob, MetricSpec, TestSpec, WarmupProfile,
};
pub use context::{CombinationContext, CombinationState, ContainerHandle, TeardownScope};
pub use error::*;
pub use harvest::{HarvestReport, ResultHarvester, StorageLayout, SUMMARY_SUFFIX};
pub use metrics::{Dimensions, MetricsPublisher, PublishedMetric, SummaryArtifact};
pub use orchestrator::{
    CombinationOutcome, CombinationReport, Orchestrator, OrchestratorBuilder, RunOptions,
    RunReport, SkipReason,
};
pub use plan::{Combination, CombinationPlan};
pub use traits::*;

#[cfg(test)]
pub(crate) mod fixtures {
    /// Two containers, one disabled, two concurrency levels
    pub const SAMPLE_JOB: &str = r#"
region: us-east-1
cloudwatch:
  metrics_namespace: Bench
metrics:
  results_ttft_s_mean:
    metric_name: TTFT_Mean
    unit: Seconds
s3:
  bucket_name: my-bucket
  folder: gpu
benchmarks:
  - model: TheBloke/Llama-2-7B-fp16
    tests:
      - test_name: short
        containers:
          - container: lmi
            action: true
            device: gpu
            image: deepjavalibrary/djl-serving:lmi
            docker_parameters: ["--gpus=all", "-p", "8080:8080"]
            server_parameters: ["--tensor-parallel-size", "1"]
          - container: vllm
            action: false
            device: neuron
            image: vllm/vllm-openai:latest
        llmperf_parameters:
          num-concurrent-requests-list: [1, 4]
          others: ["--mean-input-tokens", "550"]
"#;
}
