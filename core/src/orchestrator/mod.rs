//! Orchestrator for benchmark run lifecycle management
//!
//! The Orchestrator walks the combination plan in order and drives each
//! combination through its state machine:
//! - Device check and image pull (failures skip the combination)
//! - Container launch, warmup and measurement
//! - Teardown, guaranteed once launch was attempted
//! - Result harvest and metric publication
//!
//! # Example
//!
//! ```ignore
//! use llmperf_bench_core::{JobDescriptor, OrchestratorBuilder};
//!
//! let loaded = JobDescriptor::load("jobs.yml")?;
//! let orchestrator = OrchestratorBuilder::new(loaded.descriptor)
//!     .device_probe(probe)
//!     .images(docker.clone())
//!     .runtime(docker)
//!     .load_generator(driver)
//!     .object_store(store)
//!     .metrics_sink(sink)
//!     .build()?;
//!
//! let report = orchestrator.run().await;
//! ```

mod builder;
mod executor;
mod outcome;
mod report;

pub use builder::OrchestratorBuilder;
pub use executor::{Orchestrator, RunOptions};
pub use outcome::{CombinationOutcome, CombinationReport, Interrupt, SkipReason, StageResult};
pub use report::RunReport;
