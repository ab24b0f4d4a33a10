//! Driver for the llmperf token benchmark script

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use llmperf_bench_core::{BenchResult, LlmPerfSettings, LoadGenerator, MeasureRequest};

use crate::command::{CommandRunner, CommandSpec};

/// Runs warmup and measurement passes of the load tool
pub struct LlmPerfDriver {
    runner: Arc<dyn CommandRunner>,
    settings: LlmPerfSettings,
    working_dir: Option<PathBuf>,
}

impl LlmPerfDriver {
    /// Driver using the interpreter and script named in `settings`
    pub fn new(runner: Arc<dyn CommandRunner>, settings: LlmPerfSettings) -> Self {
        Self {
            runner,
            settings,
            working_dir: None,
        }
    }

    /// Run the script from `dir` (the llmperf checkout)
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn script(&self) -> CommandSpec {
        let spec = CommandSpec::new(&self.settings.python).arg(&self.settings.script);
        match &self.working_dir {
            Some(dir) => spec.current_dir(dir),
            None => spec,
        }
    }

    /// Fixed-profile warmup invocation; writes no results directory
    pub fn warmup_command(&self, model: &str) -> CommandSpec {
        let w = &self.settings.warmup;
        self.script()
            .args(["--model", model])
            .args(["--mean-input-tokens".to_string(), w.mean_input_tokens.to_string()])
            .args(["--stddev-input-tokens".to_string(), w.stddev_input_tokens.to_string()])
            .args(["--mean-output-tokens".to_string(), w.mean_output_tokens.to_string()])
            .args(["--stddev-output-tokens".to_string(), w.stddev_output_tokens.to_string()])
            .args([
                "--max-num-completed-requests".to_string(),
                w.max_num_completed_requests.to_string(),
            ])
            .args(["--timeout".to_string(), w.timeout_secs.to_string()])
            .args(["--num-concurrent-requests".to_string(), w.concurrency.to_string()])
            .args(["--llm-api", self.settings.llm_api.as_str()])
    }

    /// Measurement invocation
    pub fn measure_command(&self, request: &MeasureRequest<'_>) -> CommandSpec {
        self.script()
            .arg("--results-dir")
            .arg(request.output_dir.to_string_lossy())
            .args(["--model", request.model])
            .args(["--num-concurrent-requests".to_string(), request.concurrency.to_string()])
            .args(request.extra_flags.iter().cloned())
    }
}

#[async_trait]
impl LoadGenerator for LlmPerfDriver {
    async fn warmup(&self, model: &str) -> BenchResult<()> {
        self.runner
            .run(&self.warmup_command(model))
            .await?
            .check(&self.settings.python)?;
        tracing::info!(model, "warmup complete");
        Ok(())
    }

    async fn measure(&self, request: &MeasureRequest<'_>) -> BenchResult<()> {
        self.runner
            .run(&self.measure_command(request))
            .await?
            .check(&self.settings.python)?;
        Ok(())
    }
}

impl std::fmt::Debug for LlmPerfDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmPerfDriver")
            .field("settings", &self.settings)
            .field("working_dir", &self.working_dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::testing::ScriptedRunner;
    use std::path::Path;

    #[tokio::test]
    async fn test_warmup_uses_fixed_profile() {
        let runner = Arc::new(ScriptedRunner::default());
        let driver = LlmPerfDriver::new(runner.clone(), LlmPerfSettings::default());

        driver.warmup("TheBloke/Llama-2-7B-fp16").await.unwrap();

        let call = runner.call(0);
        assert_eq!(
            call.to_string(),
            "python token_benchmark_ray.py --model TheBloke/Llama-2-7B-fp16 \
             --mean-input-tokens 550 --stddev-input-tokens 150 \
             --mean-output-tokens 150 --stddev-output-tokens 10 \
             --max-num-completed-requests 50 --timeout 600 \
             --num-concurrent-requests 1 --llm-api openai"
        );
        assert!(!call.args.contains(&"--results-dir".to_string()));
    }

    #[tokio::test]
    async fn test_measure_passes_flags_through() {
        let runner = Arc::new(ScriptedRunner::default());
        let driver = LlmPerfDriver::new(runner.clone(), LlmPerfSettings::default())
            .with_working_dir("/opt/llmperf");
        let flags = vec!["--max-num-completed-requests".to_string(), "200".to_string()];

        driver
            .measure(&MeasureRequest {
                model: "m",
                concurrency: 8,
                extra_flags: &flags,
                output_dir: Path::new("results/lmi/m-t/8"),
            })
            .await
            .unwrap();

        let call = runner.call(0);
        assert_eq!(
            call.to_string(),
            "python token_benchmark_ray.py --results-dir results/lmi/m-t/8 --model m \
             --num-concurrent-requests 8 --max-num-completed-requests 200"
        );
        assert_eq!(call.current_dir, Some(PathBuf::from("/opt/llmperf")));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_error() {
        let runner = Arc::new(ScriptedRunner::default().reply(CommandOutput::failed(1, "Traceback")));
        let driver = LlmPerfDriver::new(runner, LlmPerfSettings::default());
        assert!(driver.warmup("m").await.is_err());
    }
}
