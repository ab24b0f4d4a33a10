//! Docker CLI image provisioning and container lifecycle

use std::sync::Arc;

use async_trait::async_trait;
use llmperf_bench_core::{
    BenchResult, ContainerHandle, ContainerRuntime, ImageProvisioner, LaunchRequest, TeardownScope,
};

use crate::command::{CommandRunner, CommandSpec};

/// Variable the inference servers read the model hub token from
pub const TOKEN_ENV: &str = "HUGGING_FACE_HUB_TOKEN";

/// Drives the `docker` binary
pub struct DockerCli {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl DockerCli {
    /// CLI invoking `docker` through `runner`
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: "docker".to_string(),
        }
    }

    /// Use a different binary, e.g. `podman`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(&self.program)
    }

    /// `docker run` invocation for `request`
    ///
    /// The token is handed over through the docker process environment and
    /// `-e NAME` forwards it; it never appears in the argument list.
    pub fn run_command(&self, request: &LaunchRequest<'_>) -> CommandSpec {
        self.command()
            .args(["run", "-e", TOKEN_ENV])
            .args(request.spec.docker_parameters.iter().cloned())
            .args(["--name", request.handle.as_str(), "-d"])
            .arg(&request.spec.image)
            .args(["--model", request.model])
            .args(request.spec.server_parameters.iter().cloned())
            .env(TOKEN_ENV, request.credential.expose())
    }

    async fn remove_all(&self) -> BenchResult<()> {
        let listed = self
            .runner
            .run(&self.command().args(["ps", "-aq"]))
            .await?
            .check(&self.program)?;
        let ids: Vec<&str> = listed
            .stdout
            .split_whitespace()
            .collect();
        if ids.is_empty() {
            tracing::debug!("no containers to remove");
            return Ok(());
        }
        tracing::warn!(count = ids.len(), "removing every container on the host");
        self.runner
            .run(&self.command().args(["rm", "-f"]).args(ids))
            .await?
            .check(&self.program)?;
        Ok(())
    }
}

#[async_trait]
impl ImageProvisioner for DockerCli {
    async fn ensure_image(&self, image: &str) -> BenchResult<()> {
        self.runner
            .run(&self.command().args(["pull", image]))
            .await?
            .check(&self.program)?;
        tracing::info!(image, "image ready");
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn launch(&self, request: &LaunchRequest<'_>) -> BenchResult<()> {
        let output = self
            .runner
            .run(&self.run_command(request))
            .await?
            .check(&self.program)?;
        tracing::debug!(
            handle = %request.handle,
            container_id = %output.stdout.trim(),
            "container started"
        );
        Ok(())
    }

    async fn shutdown(&self, handle: &ContainerHandle, scope: TeardownScope) -> BenchResult<()> {
        match scope {
            TeardownScope::Launched => {
                self.runner
                    .run(&self.command().args(["rm", "-f", handle.as_str()]))
                    .await?
                    .check(&self.program)?;
                tracing::info!(handle = %handle, "container removed");
                Ok(())
            }
            TeardownScope::All => self.remove_all().await,
        }
    }
}

impl std::fmt::Debug for DockerCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerCli")
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}
