//! Per-combination execution context

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BenchError;
use crate::plan::Combination;

/// Name of the container started for one combination
///
/// Generated before launch so teardown can target it even when the launch
/// itself failed halfway.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle(String);

impl ContainerHandle {
    /// Handle for `combination` within run `run_id`
    ///
    /// Docker names allow `[a-zA-Z0-9][a-zA-Z0-9_.-]*`; anything else in the
    /// logical container name is replaced with `-`.
    pub fn for_combination(run_id: &str, combination: &Combination<'_>) -> Self {
        let logical: String = combination
            .container_name()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        Self(format!(
            "llmperf-{run_id}-{}-{logical}-c{}",
            combination.ordinal, combination.concurrency
        ))
    }

    /// Wrap an existing container name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Container name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which containers teardown removes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeardownScope {
    /// Only the container started for the combination
    #[default]
    Launched,
    /// Every container on the host
    All,
}

impl FromStr for TeardownScope {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "launched" => Ok(TeardownScope::Launched),
            "all" => Ok(TeardownScope::All),
            other => Err(BenchError::config(format!("unknown teardown scope: {other}"))),
        }
    }
}

/// Pipeline states of one combination
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombinationState {
    Init,
    DeviceCheck,
    ImagePull,
    Launch,
    Warmup,
    Measure,
    Teardown,
    Harvest,
    Publish,
    Done,
    Skip,
    Failed,
}

impl CombinationState {
    /// Whether the state ends the pipeline
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CombinationState::Done | CombinationState::Skip | CombinationState::Failed
        )
    }
}

impl fmt::Display for CombinationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Mutable state carried through one combination's pipeline
#[derive(Debug)]
pub struct CombinationContext {
    /// Local directory the measurement pass writes to
    pub output_dir: PathBuf,
    /// Storage-relative result path
    pub result_path: String,
    /// Container started for this combination, set once launch is attempted
    pub handle: Option<ContainerHandle>,
    /// States visited so far, in order
    pub trace: Vec<CombinationState>,
    /// Files uploaded by the harvester
    pub uploaded: usize,
    /// Data points emitted by the publisher
    pub published: usize,
}

impl CombinationContext {
    /// Fresh context in `Init`
    pub fn new(output_dir: PathBuf, result_path: String) -> Self {
        Self {
            output_dir,
            result_path,
            handle: None,
            trace: vec![CombinationState::Init],
            uploaded: 0,
            published: 0,
        }
    }

    /// Record a transition
    pub fn enter(&mut self, state: CombinationState) {
        tracing::trace!(from = %self.state(), to = %state, "combination transition");
        self.trace.push(state);
    }

    /// Current state
    pub fn state(&self) -> CombinationState {
        self.trace
            .last()
            .copied()
            .unwrap_or(CombinationState::Init)
    }

    /// Whether a given state was visited
    pub fn visited(&self, state: CombinationState) -> bool {
        self.trace.contains(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobDescriptor;
    use crate::fixtures::SAMPLE_JOB;
    use crate::plan::CombinationPlan;

    #[test]
    fn test_handle_is_docker_safe_and_unique() {
        let yaml = SAMPLE_JOB.replace("container: lmi", "container: \"lmi/dev env\"");
        let job = JobDescriptor::from_yaml_slice(yaml.as_bytes()).unwrap();
        let plan = CombinationPlan::new(&job);
        let handles: Vec<_> = plan
            .iter()
            .map(|c| ContainerHandle::for_combination("42", &c))
            .collect();

        assert_eq!(handles[0].as_str(), "llmperf-42-0-lmi-dev-env-c1");
        assert_eq!(handles[1].as_str(), "llmperf-42-1-lmi-dev-env-c4");
    }

    #[test]
    fn test_teardown_scope_parse() {
        assert_eq!("all".parse::<TeardownScope>().unwrap(), TeardownScope::All);
        assert_eq!(TeardownScope::default(), TeardownScope::Launched);
        assert!("some".parse::<TeardownScope>().is_err());
    }

    #[test]
    fn test_context_trace() {
        let mut ctx = CombinationContext::new(PathBuf::from("out"), "a/b-c/1".into());
        assert_eq!(ctx.state(), CombinationState::Init);
        ctx.enter(CombinationState::DeviceCheck);
        ctx.enter(CombinationState::Skip);
        assert!(ctx.state().is_terminal());
        assert!(ctx.visited(CombinationState::DeviceCheck));
        assert!(!ctx.visited(CombinationState::Launch));
    }
}
