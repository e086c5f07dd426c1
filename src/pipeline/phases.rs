//! Setup and Build phases

use super::context::PipelineContext;
use super::errors::PipelineError;
use super::orchestrator::Phase;
use super::types::{PhaseKind, PhaseResult, StageResult};
use crate::executor::{EnvironmentProvider, ImageBuilder, RuntimeSpec};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Provisions the execution environment and runs setup commands in it
///
/// Publishes the `environment` slot.
pub struct SetupPhase {
    provider: Arc<dyn EnvironmentProvider>,
    runtime: RuntimeSpec,
    commands: Vec<String>,
}

impl SetupPhase {
    /// Creates the phase
    #[must_use]
    pub fn new(provider: Arc<dyn EnvironmentProvider>, runtime: RuntimeSpec, commands: Vec<String>) -> Self {
        Self {
            provider,
            runtime,
            commands,
        }
    }
}

#[async_trait]
impl Phase for SetupPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Setup
    }

    async fn run(&self, ctx: &mut PipelineContext) -> PhaseResult {
        let environment = self
            .provider
            .create(&self.runtime)
            .await
            .map_err(|e| PipelineError::Setup {
                reason: format!("could not create {} environment: {e}", self.runtime),
            })?;

        for command in &self.commands {
            let command = crate::executor::expand_variables(command, &ctx.env);
            info!(command = %command, "Running setup command");
            environment
                .run(&command)
                .await
                .map_err(|e| PipelineError::Setup {
                    reason: e.to_string(),
                })?;
        }

        ctx.set_environment(environment)?;
        Ok(StageResult::Success)
    }

    fn describe(&self) -> String {
        if self.commands.is_empty() {
            return format!("Setup: create {}", self.runtime);
        }
        format!("Setup: create {}, then {}", self.runtime, self.commands.join("; "))
    }
}

/// Builds the container image
///
/// Publishes the `artifact` slot.
pub struct BuildPhase {
    builder: Arc<dyn ImageBuilder>,
    image: String,
}

impl BuildPhase {
    /// Creates the phase building `image`
    #[must_use]
    pub fn new(builder: Arc<dyn ImageBuilder>, image: impl Into<String>) -> Self {
        Self {
            builder,
            image: image.into(),
        }
    }
}

#[async_trait]
impl Phase for BuildPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Build
    }

    async fn run(&self, ctx: &mut PipelineContext) -> PhaseResult {
        let artifact = self
            .builder
            .build(&self.image)
            .await
            .map_err(|e| PipelineError::Build {
                reason: e.to_string(),
            })?;

        info!(image = %artifact.id(), source = %artifact.source(), "Image built");
        ctx.set_artifact(artifact)?;
        Ok(StageResult::Success)
    }

    fn describe(&self) -> String {
        format!("Build: image {}", self.image)
    }
}
