//! Accelerator presence checks

use std::sync::Arc;

use async_trait::async_trait;
use llmperf_bench_core::{DeviceClass, DeviceProbe};

use crate::command::{CommandRunner, CommandSpec};

/// Probes the host for the device class a container declares
pub struct DeviceValidator {
    runner: Arc<dyn CommandRunner>,
}

impl DeviceValidator {
    /// Validator running its probes through `runner`
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// At least one GPU listed by `nvidia-smi`
    async fn gpu_present(&self) -> bool {
        let spec = CommandSpec::new("nvidia-smi").args(["--query-gpu=gpu_name", "--format=csv,noheader"]);
        match self.runner.run(&spec).await {
            Ok(output) if output.success => {
                let gpus = output.stdout.lines().filter(|l| !l.trim().is_empty()).count();
                if gpus == 0 {
                    tracing::warn!("nvidia-smi reported no GPUs");
                } else {
                    tracing::info!(gpus, "GPUs detected");
                }
                gpus > 0
            }
            Ok(output) => {
                tracing::error!(code = ?output.code, "nvidia-smi failed");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to run nvidia-smi");
                false
            }
        }
    }

    /// `neuron-ls` exits successfully
    async fn neuron_present(&self) -> bool {
        match self.runner.run(&CommandSpec::new("neuron-ls")).await {
            Ok(output) => output.success,
            Err(e) => {
                tracing::error!(error = %e, "failed to run neuron-ls");
                false
            }
        }
    }
}

#[async_trait]
impl DeviceProbe for DeviceValidator {
    async fn is_fit(&self, device: &str) -> bool {
        match device.parse::<DeviceClass>() {
            Ok(DeviceClass::Gpu) => self.gpu_present().await,
            Ok(DeviceClass::Neuron) => self.neuron_present().await,
            Err(_) => {
                tracing::error!(device, "unsupported device");
                false
            }
        }
    }
}

impl std::fmt::Debug for DeviceValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceValidator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::testing::ScriptedRunner;

    #[tokio::test]
    async fn test_gpu_fit_with_listed_devices() {
        let runner = Arc::new(ScriptedRunner::default().reply(CommandOutput::ok("NVIDIA A10G\nNVIDIA A10G\n")));
        let validator = DeviceValidator::new(runner.clone());

        assert!(validator.is_fit("gpu").await);
        assert_eq!(
            runner.call(0).to_string(),
            "nvidia-smi --query-gpu=gpu_name --format=csv,noheader"
        );
    }

    #[tokio::test]
    async fn test_gpu_unfit_on_empty_listing() {
        let runner = Arc::new(ScriptedRunner::default().reply(CommandOutput::ok("\n")));
        assert!(!DeviceValidator::new(runner).is_fit("gpu").await);
    }

    #[tokio::test]
    async fn test_gpu_unfit_when_probe_missing() {
        let runner = Arc::new(ScriptedRunner::default().spawn_error("nvidia-smi"));
        assert!(!DeviceValidator::new(runner).is_fit("gpu").await);
    }

    #[tokio::test]
    async fn test_neuron_follows_exit_status() {
        let runner = Arc::new(
            ScriptedRunner::default()
                .reply(CommandOutput::ok("instance-type: inf2.xlarge"))
                .reply(CommandOutput::failed(1, "no neuron devices")),
        );
        let validator = DeviceValidator::new(runner.clone());

        assert!(validator.is_fit("neuron").await);
        assert!(!validator.is_fit("neuron").await);
        assert_eq!(runner.call(0).program, "neuron-ls");
    }

    #[tokio::test]
    async fn test_unsupported_device_runs_nothing() {
        let runner = Arc::new(ScriptedRunner::default());
        let validator = DeviceValidator::new(runner.clone());

        assert!(!validator.is_fit("tpu").await);
        assert_eq!(runner.call_count(), 0);
    }
}
