//! Project pipeline
//!
//! Wires a [`Config`] into the four phases: a provisioned environment with
//! setup commands, an image build, the configured checks in parallel, and
//! the deploy gate.

use super::context::PipelineContext;
use super::deploy::{BranchFilter, DeployGate, DeployPhase};
use super::errors::PipelineError;
use super::orchestrator::{Orchestrator, PipelineFailure, PipelineReport};
use super::parallel::{Check, ImageCheck, ParallelTestRunner, ShellCheck, TestPhase};
use super::phases::{BuildPhase, SetupPhase};
use super::types::Validate;
use crate::executor::{EnvironmentProvider, ImageBuilder, LocalEnvironmentProvider};
use crate::infrastructure::{CheckSpec, Config, ContainerCli};
use std::sync::Arc;

/// The four configured phases plus the orchestrator running them
pub struct ProjectPipeline {
    orchestrator: Orchestrator,
    setup: SetupPhase,
    build: BuildPhase,
    test: TestPhase,
    deploy: DeployPhase,
}

impl ProjectPipeline {
    /// Builds the pipeline with local collaborators: a virtualenv or host
    /// shell, and the configured container runtime CLI
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] if the config is invalid.
    pub fn local(config: &Config, ctx: &PipelineContext) -> Result<Self, PipelineError> {
        let provider = LocalEnvironmentProvider::new(ctx.workspace())
            .with_env(ctx.env.clone())
            .with_timeout(config.command_timeout());
        let builder = ContainerCli::new(config.container_runtime, ctx.workspace())
            .with_build_context(&config.build_context)
            .with_timeout(config.command_timeout());

        Self::with_collaborators(config, Arc::new(provider), Arc::new(builder))
    }

    /// Builds the pipeline around the given collaborators
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] if the config is invalid.
    pub fn with_collaborators(
        config: &Config,
        provider: Arc<dyn EnvironmentProvider>,
        builder: Arc<dyn ImageBuilder>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let mut runner = ParallelTestRunner::new();
        for (name, spec) in &config.checks {
            let check: Arc<dyn Check> = match spec {
                CheckSpec::Shell(command) => Arc::new(ShellCheck::new(command.clone())),
                CheckSpec::Image(args) => Arc::new(ImageCheck::new(args.iter().cloned())),
            };
            runner.add(name.clone(), check)?;
        }

        let gate = DeployGate::new(BranchFilter::new(&config.deploy_branches))
            .with_policy(config.pull_failure_policy);

        Ok(Self {
            orchestrator: Orchestrator::new(),
            setup: SetupPhase::new(provider, config.runtime.clone(), config.setup.clone()),
            build: BuildPhase::new(builder, config.image.clone()),
            test: TestPhase::new(runner),
            deploy: DeployPhase::new(gate, config.version_file.clone(), config.registry.clone()),
        })
    }

    /// Replaces the orchestrator, e.g. to attach metrics
    #[must_use]
    pub fn with_orchestrator(mut self, orchestrator: Orchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    /// Runs Setup, Build, Test and Deploy against `ctx`
    ///
    /// # Errors
    ///
    /// Returns the failure of the first failing phase.
    pub async fn run(&self, ctx: &mut PipelineContext) -> Result<PipelineReport, PipelineFailure> {
        self.orchestrator
            .run(ctx, &self.setup, &self.build, &self.test, &self.deploy)
            .await
    }

    /// Describes each phase without running anything
    #[must_use]
    pub fn plan(&self) -> Vec<String> {
        self.orchestrator
            .plan(&self.setup, &self.build, &self.test, &self.deploy)
    }
}
