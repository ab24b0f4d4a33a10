//! Flattening of the job matrix into an ordered sequence of combinations
//!
//! The plan is lazy and restartable: every call to [`CombinationPlan::iter`]
//! walks the descriptor again in model -> test -> container -> concurrency
//! order, skipping disabled containers. Execution order is therefore decided
//! here and nowhere else.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{ContainerSpec, JobDescriptor, TestSpec};

/// Storage-relative path of one combination's results
///
/// `<container>/<model>-<test>/<concurrency>`
pub fn result_path(container: &str, model: &str, test_name: &str, concurrency: u32) -> String {
    format!("{container}/{model}-{test_name}/{concurrency}")
}

/// One (model, test, container, concurrency) tuple
#[derive(Debug, Clone, Copy)]
pub struct Combination<'a> {
    /// Position in the plan, starting at 0
    pub ordinal: usize,
    /// Model identifier
    pub model: &'a str,
    /// Test the combination belongs to
    pub test: &'a TestSpec,
    /// Container to launch
    pub container: &'a ContainerSpec,
    /// Concurrent simulated clients
    pub concurrency: u32,
}

impl<'a> Combination<'a> {
    /// Test name
    pub fn test_name(&self) -> &'a str {
        &self.test.test_name
    }

    /// Logical container name
    pub fn container_name(&self) -> &'a str {
        &self.container.container
    }

    /// Extra measurement flags from the test
    pub fn extra_flags(&self) -> &'a [String] {
        &self.test.llmperf_parameters.others
    }

    /// Path relative to the results root and to the storage metrics prefix
    pub fn result_path(&self) -> String {
        result_path(
            self.container_name(),
            self.model,
            self.test_name(),
            self.concurrency,
        )
    }

    /// Local output directory under `root`
    pub fn output_dir(&self, root: &Path) -> PathBuf {
        root.join(self.result_path())
    }
}

impl fmt::Display for Combination<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model={} test={} container={} concurrency={}",
            self.model,
            self.test_name(),
            self.container_name(),
            self.concurrency
        )
    }
}

/// Sequence builder over a job descriptor
#[derive(Debug, Clone, Copy)]
pub struct CombinationPlan<'a> {
    job: &'a JobDescriptor,
}

impl<'a> CombinationPlan<'a> {
    /// Plan over `job`
    pub fn new(job: &'a JobDescriptor) -> Self {
        Self { job }
    }

    /// Iterate the combinations in execution order
    pub fn iter(&self) -> impl Iterator<Item = Combination<'a>> + 'a {
        let job = self.job;
        job.benchmarks
            .iter()
            .flat_map(|benchmark| {
                benchmark.tests.iter().flat_map(move |test| {
                    test.containers
                        .iter()
                        .filter(|container| container.action)
                        .flat_map(move |container| {
                            test.llmperf_parameters
                                .concurrency
                                .iter()
                                .map(move |&concurrency| Combination {
                                    ordinal: 0,
                                    model: &benchmark.model,
                                    test,
                                    container,
                                    concurrency,
                                })
                        })
                })
            })
            .enumerate()
            .map(|(ordinal, combination)| Combination {
                ordinal,
                ..combination
            })
    }

    /// Number of combinations
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether there is nothing to run
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::SAMPLE_JOB;

    fn job(yaml: &str) -> JobDescriptor {
        JobDescriptor::from_yaml_slice(yaml.as_bytes()).unwrap()
    }

    #[test]
    fn test_result_path_layout() {
        assert_eq!(result_path("lmi", "org/model", "short", 8), "lmi/org/model-short/8");
    }

    #[test]
    fn test_disabled_containers_are_excluded() {
        let job = job(SAMPLE_JOB);
        let plan = CombinationPlan::new(&job);
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|c| c.container_name() == "lmi"));
    }

    #[test]
    fn test_iteration_order_and_ordinals() {
        let yaml = r#"
benchmarks:
  - model: m1
    tests:
      - test_name: t1
        containers:
          - {action: true, device: gpu, image: a, container: ca}
          - {action: true, device: gpu, image: b, container: cb}
        llmperf_parameters:
          num-concurrent-requests-list: [1, 2]
  - model: m2
    tests:
      - test_name: t2
        containers:
          - {action: true, device: neuron, image: c, container: cc}
        llmperf_parameters:
          num-concurrent-requests-list: [8]
"#;
        let job = job(yaml);
        let plan = CombinationPlan::new(&job);
        let seen: Vec<_> = plan
            .iter()
            .map(|c| (c.ordinal, c.model, c.container_name(), c.concurrency))
            .collect();
        assert_eq!(
            seen,
            vec![
                (0, "m1", "ca", 1),
                (1, "m1", "ca", 2),
                (2, "m1", "cb", 1),
                (3, "m1", "cb", 2),
                (4, "m2", "cc", 8),
            ]
        );
    }

    #[test]
    fn test_plan_is_restartable() {
        let job = job(SAMPLE_JOB);
        let plan = CombinationPlan::new(&job);
        let first: Vec<_> = plan.iter().map(|c| c.result_path()).collect();
        let second: Vec<_> = plan.iter().map(|c| c.result_path()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_output_dir_under_root() {
        let job = job(SAMPLE_JOB);
        let plan = CombinationPlan::new(&job);
        let combo = plan.iter().next().unwrap();
        assert_eq!(
            combo.output_dir(Path::new("/tmp/results")),
            PathBuf::from("/tmp/results/lmi/TheBloke/Llama-2-7B-fp16-short/1")
        );
        assert_eq!(combo.extra_flags(), ["--mean-input-tokens", "550"]);
    }
}
