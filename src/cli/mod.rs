//! CLI argument parsing and command dispatch

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use llmperf_bench_core::{
    CombinationPlan, Credential, JobDescriptor, LoadedJob, MetricsSink, ObjectStore,
    OrchestratorBuilder, RunOptions, TeardownScope,
};
use llmperf_bench_host::{DeviceValidator, DockerCli, LlmPerfDriver, ProcessRunner};

#[derive(Parser, Debug)]
#[command(name = "llmperf-bench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every enabled combination of a job document
    Run(RunArgs),
    /// Validate a job document and print the combination plan
    Validate {
        /// Path to the job document
        #[arg(short, long)]
        jobs: PathBuf,
    },
}

/// Durable storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    /// AWS S3 (requires the `aws` feature)
    S3,
    /// Local directory per bucket
    Local,
}

/// Metrics backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetricsBackend {
    /// AWS CloudWatch (requires the `aws` feature)
    Cloudwatch,
    /// Structured log lines
    Log,
    /// JSON lines file
    Jsonl,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the job document
    #[arg(short, long)]
    pub jobs: PathBuf,

    /// Instance type, reported as a metric dimension
    #[arg(short, long, env = "INSTANCE_TYPE")]
    pub instance: String,

    /// Directory measurement output is written under
    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,

    /// Containers removed after each combination (launched, all)
    #[arg(long, default_value = "launched")]
    pub teardown: TeardownScope,

    /// Durable storage backend
    #[arg(long, value_enum, default_value_t = StorageBackend::S3)]
    pub storage: StorageBackend,

    /// Root directory of the local store
    #[arg(long, default_value = "bench-store")]
    pub local_store: PathBuf,

    /// Metrics backend
    #[arg(long, value_enum, default_value_t = MetricsBackend::Cloudwatch)]
    pub metrics: MetricsBackend,

    /// Output file of the jsonl metrics backend
    #[arg(long, default_value = "results/metrics.jsonl")]
    pub metrics_file: PathBuf,

    /// Directory the load tool script is run from
    #[arg(long)]
    pub llmperf_dir: Option<PathBuf>,

    /// Write the run report as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Label distinguishing this run's container names
    #[arg(long)]
    pub run_id: Option<String>,
}

impl Cli {
    /// Dispatch the parsed command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Run(args) => run(args).await,
            Commands::Validate { jobs } => validate(&jobs),
        }
    }
}

fn load_job(path: &Path) -> Result<LoadedJob> {
    JobDescriptor::load(path).with_context(|| format!("invalid job document {}", path.display()))
}

fn validate(path: &Path) -> Result<()> {
    let loaded = load_job(path)?;
    let plan = CombinationPlan::new(&loaded.descriptor);
    println!("{} is valid: {} combinations", path.display(), plan.len());
    for combination in plan.iter() {
        println!(
            "  #{:<3} device={:<6} image={} -> {}",
            combination.ordinal,
            combination.container.device,
            combination.container.image,
            combination.result_path()
        );
    }
    Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
    let loaded = load_job(&args.jobs)?;
    let job = loaded.descriptor;
    tracing::info!(
        jobs = %loaded.path.display(),
        region = %job.region,
        bucket = %job.s3.bucket_name,
        namespace = %job.cloudwatch.metrics_namespace,
        "loaded job document"
    );

    let store = object_store(&args, &job.region).await?;
    let sink = metrics_sink(&args, &job.region).await?;

    let runner = Arc::new(ProcessRunner);
    let docker = Arc::new(DockerCli::new(runner.clone()));
    let mut driver = LlmPerfDriver::new(runner.clone(), job.llmperf.clone());
    if let Some(dir) = &args.llmperf_dir {
        driver = driver.with_working_dir(dir);
    }

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
            .context("invalid progress template")?
            .progress_chars("=> "),
    );

    let mut options = RunOptions {
        results_root: args.results_dir,
        instance_type: args.instance,
        teardown: args.teardown,
        ..RunOptions::default()
    };
    if let Some(run_id) = args.run_id {
        options.run_id = run_id;
    }

    let orchestrator = OrchestratorBuilder::new(job)
        .credential(Credential::from_env())
        .options(options)
        .device_probe(Arc::new(DeviceValidator::new(runner)))
        .images(docker.clone())
        .runtime(docker)
        .load_generator(Arc::new(driver))
        .object_store(store)
        .metrics_sink(sink)
        .config_snapshot(loaded.raw)
        .progress(progress)
        .build()
        .context("failed to build orchestrator")?;

    let report = orchestrator.run().await;
    println!("{}", llmperf_bench_report::render_summary(&report));

    if let Some(path) = &args.report {
        llmperf_bench_report::write_report_json(&report, path)
            .await
            .with_context(|| format!("failed to write report {}", path.display()))?;
    }

    Ok(())
}

#[cfg_attr(not(feature = "aws"), allow(unused_variables))]
async fn object_store(args: &RunArgs, region: &str) -> Result<Arc<dyn ObjectStore>> {
    match args.storage {
        StorageBackend::Local => Ok(Arc::new(llmperf_bench_storage::LocalStore::new(
            &args.local_store,
        ))),
        #[cfg(feature = "aws")]
        StorageBackend::S3 => Ok(Arc::new(
            llmperf_bench_storage::S3Store::from_region(region).await,
        )),
        #[cfg(not(feature = "aws"))]
        StorageBackend::S3 => anyhow::bail!("S3 storage requires building with --features aws"),
    }
}

#[cfg_attr(not(feature = "aws"), allow(unused_variables))]
async fn metrics_sink(args: &RunArgs, region: &str) -> Result<Arc<dyn MetricsSink>> {
    match args.metrics {
        MetricsBackend::Log => Ok(Arc::new(llmperf_bench_report::LogSink)),
        MetricsBackend::Jsonl => Ok(Arc::new(
            llmperf_bench_report::JsonLinesSink::open(&args.metrics_file)
                .await
                .with_context(|| format!("cannot open {}", args.metrics_file.display()))?,
        )),
        #[cfg(feature = "aws")]
        MetricsBackend::Cloudwatch => Ok(Arc::new(
            llmperf_bench_report::CloudWatchSink::from_region(region).await,
        )),
        #[cfg(not(feature = "aws"))]
        MetricsBackend::Cloudwatch => anyhow::bail!("CloudWatch metrics require building with --features aws"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_defaults() {
        let cli = Cli::parse_from(["llmperf-bench", "run", "--jobs", "jobs.yml", "--instance", "g5.12xlarge"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.results_dir, PathBuf::from("results"));
        assert_eq!(args.teardown, TeardownScope::Launched);
        assert_eq!(args.storage, StorageBackend::S3);
        assert_eq!(args.metrics, MetricsBackend::Cloudwatch);
    }

    #[test]
    fn test_run_args_overrides() {
        let cli = Cli::parse_from([
            "llmperf-bench",
            "-v",
            "run",
            "-j",
            "jobs.yml",
            "-i",
            "inf2.xlarge",
            "--teardown",
            "all",
            "--storage",
            "local",
            "--metrics",
            "jsonl",
        ]);
        assert!(cli.verbose);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.teardown, TeardownScope::All);
        assert_eq!(args.storage, StorageBackend::Local);
        assert_eq!(args.metrics, MetricsBackend::Jsonl);
    }

    #[test]
    fn test_validate_rejects_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.yml");
        std::fs::write(&path, "").unwrap();
        assert!(validate(&path).is_err());
    }
}
