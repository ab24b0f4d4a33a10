//! Host collaborators driven through external commands
//!
//! This crate provides implementations of the core host traits:
//!
//! - `DeviceProbe`: `nvidia-smi` and `neuron-ls` checks
//! - `ImageProvisioner` and `ContainerRuntime`: the docker CLI
//! - `LoadGenerator`: the llmperf benchmark script

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod device;
pub mod docker;
pub mod llmperf;

pub use command::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use device::DeviceValidator;
pub use docker::{DockerCli, TOKEN_ENV};
pub use llmperf::LlmPerfDriver;

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use llmperf_bench_core::{BenchError, BenchResult};

    use crate::command::{CommandOutput, CommandRunner, CommandSpec};

    /// Replays queued outputs and records every invocation
    #[derive(Default)]
    pub struct ScriptedRunner {
        pub calls: Mutex<Vec<CommandSpec>>,
        replies: Mutex<VecDeque<BenchResult<CommandOutput>>>,
    }

    impl ScriptedRunner {
        pub fn reply(self, output: CommandOutput) -> Self {
            self.replies.lock().unwrap().push_back(Ok(output));
            self
        }

        pub fn spawn_error(self, program: &str) -> Self {
            self.replies
                .lock()
                .unwrap()
                .push_back(Err(BenchError::command(program, "No such file or directory")));
            self
        }

        pub fn call(&self, index: usize) -> CommandSpec {
            self.calls.lock().unwrap()[index].clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, spec: &CommandSpec) -> BenchResult<CommandOutput> {
            self.calls.lock().unwrap().push(spec.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(CommandOutput::ok("")))
        }
    }
}
