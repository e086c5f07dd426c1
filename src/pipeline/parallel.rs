//! Parallel test runner
//!
//! Every check is spawned at once and runs to completion; a failing check
//! never cancels its siblings. Checks get a shared read-only snapshot of
//! the context. Once all have finished, every failure is reported
//! together, sorted by check name.

use super::context::PipelineContext;
use super::errors::{CheckError, PipelineError, TaskFailure, ValidationError};
use super::orchestrator::Phase;
use super::types::{PhaseKind, PhaseResult, StageResult};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// One independent check run during the Test phase
#[async_trait]
pub trait Check: Send + Sync {
    /// Runs the check against the published context
    async fn run(&self, ctx: &PipelineContext) -> Result<(), CheckError>;

    /// Short description for dry runs
    fn describe(&self) -> String;
}

/// Runs a command in the environment published by Setup
#[derive(Debug, Clone)]
pub struct ShellCheck {
    command: String,
}

impl ShellCheck {
    /// Creates a check running `command`
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Check for ShellCheck {
    async fn run(&self, ctx: &PipelineContext) -> Result<(), CheckError> {
        let environment = ctx
            .try_environment()
            .ok_or(CheckError::MissingContext("environment"))?;
        let command = crate::executor::expand_variables(&self.command, &ctx.env);
        environment.run(&command).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.command.clone()
    }
}

/// Runs the image published by Build against workspace files
#[derive(Debug, Clone)]
pub struct ImageCheck {
    args: Vec<String>,
}

impl ImageCheck {
    /// Creates a check passing `args` to the image
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Check for ImageCheck {
    async fn run(&self, ctx: &PipelineContext) -> Result<(), CheckError> {
        let artifact = ctx
            .try_artifact()
            .ok_or(CheckError::MissingContext("artifact"))?;
        artifact.run(&self.args, ctx.workspace()).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("<image> {}", shell_words::join(&self.args))
    }
}

/// Named checks run concurrently with fail-slow semantics
#[derive(Default, Clone)]
pub struct ParallelTestRunner {
    checks: BTreeMap<String, Arc<dyn Check>>,
}

impl ParallelTestRunner {
    /// Creates an empty runner
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a check under `name`
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] for a blank name and
    /// [`ValidationError::DuplicateTask`] if `name` is already taken.
    pub fn add(&mut self, name: impl Into<String>, check: Arc<dyn Check>) -> Result<(), ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.checks.contains_key(&name) {
            return Err(ValidationError::DuplicateTask(name));
        }
        self.checks.insert(name, check);
        Ok(())
    }

    /// Builder form of [`ParallelTestRunner::add`]
    ///
    /// # Errors
    ///
    /// Same as [`ParallelTestRunner::add`].
    pub fn with_check(mut self, name: impl Into<String>, check: Arc<dyn Check>) -> Result<Self, ValidationError> {
        self.add(name, check)?;
        Ok(self)
    }

    /// Names of registered checks, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.checks.keys().map(String::as_str)
    }

    /// Number of registered checks
    #[must_use]
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Returns true if no checks are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Runs every check concurrently and waits for all of them
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Test`] listing every failed check.
    pub async fn run_all(&self, ctx: Arc<PipelineContext>) -> Result<(), PipelineError> {
        info!(checks = self.checks.len(), "Running checks in parallel");

        let (names, handles): (Vec<_>, Vec<_>) = self
            .checks
            .iter()
            .map(|(name, check)| {
                let check = Arc::clone(check);
                let ctx = Arc::clone(&ctx);

                let handle = tokio::spawn(async move {
                    let start = Instant::now();
                    let result = check.run(&ctx).await;
                    (result, start.elapsed())
                });
                (name.clone(), handle)
            })
            .unzip();

        let mut failures = Vec::new();
        for (name, joined) in names.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok((Ok(()), duration)) => {
                    info!(check = %name, duration_ms = duration.as_millis(), "Check passed");
                }
                Ok((Err(err), duration)) => {
                    error!(check = %name, duration_ms = duration.as_millis(), error = %err, "Check failed");
                    failures.push(TaskFailure::new(name, err.to_string()));
                }
                Err(join_err) => {
                    let err = CheckError::Panicked(join_err.to_string());
                    error!(check = %name, error = %err, "Check aborted");
                    failures.push(TaskFailure::new(name, err.to_string()));
                }
            }
        }

        if failures.is_empty() {
            return Ok(());
        }

        failures.sort_by(|a, b| a.task.cmp(&b.task));
        Err(PipelineError::Test { failures })
    }
}

/// Test phase: runs the registered checks against a snapshot of the context
#[derive(Clone)]
pub struct TestPhase {
    runner: ParallelTestRunner,
}

impl TestPhase {
    /// Creates the phase
    #[must_use]
    pub fn new(runner: ParallelTestRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Phase for TestPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Test
    }

    async fn run(&self, ctx: &mut PipelineContext) -> PhaseResult {
        if self.runner.is_empty() {
            info!("No checks registered");
            return Ok(StageResult::Skipped);
        }

        self.runner.run_all(Arc::new(ctx.clone())).await?;
        Ok(StageResult::Success)
    }

    fn describe(&self) -> String {
        let checks = self
            .runner
            .checks
            .iter()
            .map(|(name, check)| format!("{name} ({})", check.describe()))
            .collect::<Vec<_>>()
            .join(", ");
        format!("Test: in parallel [{checks}]")
    }
}
