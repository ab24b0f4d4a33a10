//! Orchestrator execution logic

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use indicatif::ProgressBar;
use tracing::Instrument;

use crate::config::{Credential, JobDescriptor};
use crate::context::{CombinationContext, CombinationState, ContainerHandle, TeardownScope};
use crate::error::BenchError;
use crate::harvest::ResultHarvester;
use crate::metrics::{Dimensions, MetricsPublisher};
use crate::plan::{Combination, CombinationPlan};
use crate::traits::{
    ContainerRuntime, DeviceProbe, ImageProvisioner, LaunchRequest, LoadGenerator, MeasureRequest,
};

use super::outcome::{CombinationOutcome, CombinationReport, Interrupt, SkipReason, StageResult};
use super::report::RunReport;

/// Per-run settings that do not come from the job document
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Local directory output directories are created under
    pub results_root: PathBuf,
    /// Instance type label, used only as a metrics dimension
    pub instance_type: String,
    /// Which containers teardown removes
    pub teardown: TeardownScope,
    /// Distinguishes container handles of concurrent runs on one host
    pub run_id: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            results_root: PathBuf::from("results"),
            instance_type: "unknown".to_string(),
            teardown: TeardownScope::default(),
            run_id: std::process::id().to_string(),
        }
    }
}

/// Orchestrator walks the job plan and runs each combination's pipeline
///
/// Combinations run strictly one after another. A failure inside one
/// combination is recorded in its report and never stops the run.
pub struct Orchestrator {
    pub(crate) job: JobDescriptor,
    pub(crate) options: RunOptions,
    pub(crate) credential: Credential,
    pub(crate) devices: Arc<dyn DeviceProbe>,
    pub(crate) images: Arc<dyn ImageProvisioner>,
    pub(crate) runtime: Arc<dyn ContainerRuntime>,
    pub(crate) load: Arc<dyn LoadGenerator>,
    pub(crate) harvester: ResultHarvester,
    pub(crate) publisher: MetricsPublisher,
    pub(crate) snapshot: Option<Vec<u8>>,
    pub(crate) progress: ProgressBar,
}

impl Orchestrator {
    /// The job being run
    pub fn job(&self) -> &JobDescriptor {
        &self.job
    }

    /// Run options
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run every combination of the plan
    pub async fn run(&self) -> RunReport {
        let start = Instant::now();
        let plan = CombinationPlan::new(&self.job);
        let mut report = RunReport::default();

        tracing::info!(
            combinations = plan.len(),
            instance_type = %self.options.instance_type,
            results_root = %self.options.results_root.display(),
            teardown = ?self.options.teardown,
            "Starting benchmark run"
        );

        if let Some(raw) = &self.snapshot {
            match self.harvester.upload_config_snapshot(raw).await {
                Ok(()) => report.snapshot_uploaded = true,
                Err(e) => tracing::error!(error = %e, "failed to upload job config snapshot"),
            }
        }

        self.progress.set_length(plan.len() as u64);
        for combination in plan.iter() {
            self.progress.set_message(format!(
                "{} {} c={}",
                combination.container_name(),
                combination.test_name(),
                combination.concurrency
            ));
            let outcome = self.run_combination(&combination).await;
            self.progress.inc(1);
            report.combinations.push(outcome);
        }
        self.progress.finish_with_message("Benchmark run complete");

        report.elapsed = start.elapsed();
        tracing::info!(
            elapsed_secs = report.elapsed.as_secs_f64(),
            done = report.done(),
            skipped = report.skipped(),
            failed = report.failed(),
            published = report.published(),
            "Benchmark run completed"
        );
        report
    }

    /// Run one combination end to end
    pub async fn run_combination(&self, combination: &Combination<'_>) -> CombinationReport {
        let span = tracing::info_span!(
            "combination",
            model = %combination.model,
            test = %combination.test_name(),
            container = %combination.container_name(),
            concurrency = combination.concurrency,
        );

        async {
            let start = Instant::now();
            let mut ctx = CombinationContext::new(
                combination.output_dir(&self.options.results_root),
                combination.result_path(),
            );

            let result = self.pipeline(combination, &mut ctx).await;
            let outcome = match result {
                Ok(()) => {
                    ctx.enter(CombinationState::Done);
                    tracing::info!(published = ctx.published, uploaded = ctx.uploaded, "combination done");
                    CombinationOutcome::Done
                }
                Err(Interrupt::Skip(reason)) => {
                    ctx.enter(CombinationState::Skip);
                    tracing::warn!(%reason, "combination skipped");
                    CombinationOutcome::Skipped(reason)
                }
                Err(Interrupt::Fail(e)) => {
                    ctx.enter(CombinationState::Failed);
                    tracing::error!(
                        test = %combination.test_name(),
                        container = %combination.container_name(),
                        concurrency = combination.concurrency,
                        error = %e,
                        "combination failed"
                    );
                    CombinationOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };

            CombinationReport::new(combination, ctx, outcome, start.elapsed())
        }
        .instrument(span)
        .await
    }

    /// DeviceCheck -> ImagePull -> [Launch -> Warmup -> Measure] -> Teardown -> Harvest -> Publish
    ///
    /// Teardown runs whenever launch was attempted, whatever the live phase
    /// returned, panics included.
    async fn pipeline(&self, combination: &Combination<'_>, ctx: &mut CombinationContext) -> StageResult {
        self.check_device(combination, ctx).await?;
        self.pull_image(combination, ctx).await?;

        let handle = ContainerHandle::for_combination(&self.options.run_id, combination);
        ctx.handle = Some(handle.clone());

        let live = AssertUnwindSafe(self.live_phase(combination, &handle, ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(panicked("live phase", panic)));

        self.teardown(&handle, ctx).await;
        live?;

        AssertUnwindSafe(self.collect(combination, ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(panicked("result collection", panic)))
    }

    async fn check_device(&self, combination: &Combination<'_>, ctx: &mut CombinationContext) -> StageResult {
        ctx.enter(CombinationState::DeviceCheck);
        let device = &combination.container.device;
        if self.devices.is_fit(device).await {
            Ok(())
        } else {
            Err(SkipReason::DeviceUnavailable {
                device: device.clone(),
            }
            .into())
        }
    }

    async fn pull_image(&self, combination: &Combination<'_>, ctx: &mut CombinationContext) -> StageResult {
        ctx.enter(CombinationState::ImagePull);
        let image = &combination.container.image;
        self.images.ensure_image(image).await.map_err(|e| {
            tracing::error!(image = %image, error = %e, "failed to provision image");
            Interrupt::Skip(SkipReason::ImageUnavailable {
                image: image.clone(),
                error: e.to_string(),
            })
        })
    }

    async fn live_phase(
        &self,
        combination: &Combination<'_>,
        handle: &ContainerHandle,
        ctx: &mut CombinationContext,
    ) -> StageResult {
        ctx.enter(CombinationState::Launch);
        let request = LaunchRequest {
            handle,
            spec: combination.container,
            model: combination.model,
            credential: &self.credential,
        };
        self.runtime.launch(&request).await.map_err(|e| {
            Interrupt::Skip(SkipReason::LaunchFailed {
                error: e.to_string(),
            })
        })?;
        tracing::info!(handle = %handle, "container launched");

        ctx.enter(CombinationState::Warmup);
        self.load.warmup(combination.model).await.map_err(|e| {
            Interrupt::Skip(SkipReason::WarmupFailed {
                error: e.to_string(),
            })
        })?;

        ctx.enter(CombinationState::Measure);
        reset_output_dir(&ctx.output_dir).await?;
        self.load
            .measure(&MeasureRequest {
                model: combination.model,
                concurrency: combination.concurrency,
                extra_flags: combination.extra_flags(),
                output_dir: &ctx.output_dir,
            })
            .await?;
        tracing::info!(output_dir = %ctx.output_dir.display(), "measurement complete");

        Ok(())
    }

    async fn teardown(&self, handle: &ContainerHandle, ctx: &mut CombinationContext) {
        ctx.enter(CombinationState::Teardown);
        if let Err(e) = self.runtime.shutdown(handle, self.options.teardown).await {
            tracing::warn!(handle = %handle, error = %e, "teardown failed");
        }
    }

    async fn collect(&self, combination: &Combination<'_>, ctx: &mut CombinationContext) -> StageResult {
        ctx.enter(CombinationState::Harvest);
        let harvest = self.harvester.harvest(&ctx.output_dir, &ctx.result_path).await;
        ctx.uploaded = harvest.uploaded;

        ctx.enter(CombinationState::Publish);
        let dimensions = Dimensions {
            model: combination.model.to_string(),
            endpoint: self.job.endpoint.clone(),
            container: combination.container_name().to_string(),
            instance_type: self.options.instance_type.clone(),
            concurrency: combination.concurrency.to_string(),
        };
        ctx.published = self.publisher.publish(&harvest.summary, &dimensions).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("options", &self.options)
            .field("benchmarks", &self.job.benchmarks.len())
            .field("harvester", &self.harvester)
            .field("publisher", &self.publisher)
            .finish()
    }
}

/// Clear stale results so only this pass's files are harvested
async fn reset_output_dir(dir: &Path) -> Result<(), BenchError> {
    if tokio::fs::try_exists(dir).await? {
        tracing::warn!(dir = %dir.display(), "removing stale output directory");
        tokio::fs::remove_dir_all(dir).await?;
    }
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

fn panicked(stage: &str, panic: Box<dyn Any + Send>) -> Interrupt {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    Interrupt::Fail(BenchError::orchestration(format!("{stage} panicked: {message}")))
}
