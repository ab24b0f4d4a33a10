//! Stage results and per-combination reports

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::context::{CombinationContext, CombinationState};
use crate::error::BenchError;
use crate::plan::Combination;

/// Why a combination was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The declared device class is missing or unsupported on this host
    DeviceUnavailable {
        /// Declared device class
        device: String,
    },
    /// The image could not be provisioned
    ImageUnavailable {
        /// Image reference
        image: String,
        /// Provisioning error
        error: String,
    },
    /// The container did not start
    LaunchFailed {
        /// Runtime error
        error: String,
    },
    /// The server could not complete the warmup pass
    WarmupFailed {
        /// Load tool error
        error: String,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DeviceUnavailable { device } => write!(f, "device {device} unavailable"),
            SkipReason::ImageUnavailable { image, error } => {
                write!(f, "image {image} unavailable: {error}")
            }
            SkipReason::LaunchFailed { error } => write!(f, "launch failed: {error}"),
            SkipReason::WarmupFailed { error } => write!(f, "warmup failed: {error}"),
        }
    }
}

/// Early exit from a combination's pipeline
#[derive(Debug)]
pub enum Interrupt {
    /// Combination cannot run here; not an error of the run
    Skip(SkipReason),
    /// Combination broke partway
    Fail(BenchError),
}

impl From<BenchError> for Interrupt {
    fn from(e: BenchError) -> Self {
        Interrupt::Fail(e)
    }
}

impl From<SkipReason> for Interrupt {
    fn from(reason: SkipReason) -> Self {
        Interrupt::Skip(reason)
    }
}

/// Result of one pipeline stage
pub type StageResult<T = ()> = Result<T, Interrupt>;

/// Final outcome of one combination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CombinationOutcome {
    /// Ran to completion
    Done,
    /// Skipped
    Skipped(SkipReason),
    /// Failed; the error message
    Failed {
        /// Error message
        error: String,
    },
}

impl CombinationOutcome {
    /// Short status label
    pub fn label(&self) -> &'static str {
        match self {
            CombinationOutcome::Done => "done",
            CombinationOutcome::Skipped(_) => "skipped",
            CombinationOutcome::Failed { .. } => "failed",
        }
    }
}

/// What happened to one combination
#[derive(Debug, Clone, Serialize)]
pub struct CombinationReport {
    /// Position in the plan
    pub ordinal: usize,
    /// Model identifier
    pub model: String,
    /// Test name
    pub test_name: String,
    /// Logical container name
    pub container: String,
    /// Concurrency level
    pub concurrency: u32,
    /// Storage-relative result path
    pub result_path: String,
    /// Final outcome
    pub outcome: CombinationOutcome,
    /// States visited, in order
    pub trace: Vec<CombinationState>,
    /// Artifacts uploaded
    pub uploaded: usize,
    /// Data points published
    pub published: usize,
    /// Wall time of the pipeline
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl CombinationReport {
    pub(crate) fn new(
        combination: &Combination<'_>,
        ctx: CombinationContext,
        outcome: CombinationOutcome,
        elapsed: Duration,
    ) -> Self {
        Self {
            ordinal: combination.ordinal,
            model: combination.model.to_string(),
            test_name: combination.test_name().to_string(),
            container: combination.container_name().to_string(),
            concurrency: combination.concurrency,
            result_path: ctx.result_path,
            outcome,
            trace: ctx.trace,
            uploaded: ctx.uploaded,
            published: ctx.published,
            elapsed,
        }
    }

    /// Whether the combination reached `state`
    pub fn visited(&self, state: CombinationState) -> bool {
        self.trace.contains(&state)
    }

    /// Whether teardown was attempted
    pub fn torn_down(&self) -> bool {
        self.visited(CombinationState::Teardown)
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}
