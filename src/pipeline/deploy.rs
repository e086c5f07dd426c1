//! Deploy gate
//!
//! Decides per run whether the built image is published:
//!
//! 1. Branches outside the [`BranchFilter`] skip Deploy entirely.
//! 2. The release version is read from the version file.
//! 3. Pulling `image:version` probes the registry. A successful pull means
//!    the version is already released and nothing is pushed. A failed pull
//!    means it is not, and the image is pushed as `version` and `latest`.

use super::context::PipelineContext;
use super::errors::{PipelineError, RegistryError, RegistryOperation};
use super::orchestrator::Phase;
use super::types::{PhaseKind, PhaseResult, StageResult};
use crate::executor::{Artifact, Registry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Floating tag pushed alongside every release
pub const LATEST_TAG: &str = "latest";

const BRANCH_PREFIXES: [&str; 4] = ["refs/heads/", "refs/remotes/", "remotes/", "origin/"];

/// Strips remote and ref prefixes from a branch identifier
///
/// `origin/master`, `refs/heads/master` and `origin/refs/heads/master`
/// all normalize to `master`. Applying it twice changes nothing.
#[must_use]
pub fn normalize_branch(branch: &str) -> String {
    let mut name = branch.trim();
    while let Some(rest) = BRANCH_PREFIXES
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
    {
        name = rest;
    }
    name.to_string()
}

/// Branches on which Deploy runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchFilter {
    allowed: BTreeSet<String>,
}

impl BranchFilter {
    /// Creates a filter from branch names, normalizing each
    pub fn new<I, S>(branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: branches
                .into_iter()
                .map(|b| normalize_branch(b.as_ref()))
                .filter(|b| !b.is_empty())
                .collect(),
        }
    }

    /// Returns true if Deploy should run for `branch`
    #[must_use]
    pub fn allows(&self, branch: &str) -> bool {
        self.allowed.contains(&normalize_branch(branch))
    }

    /// Allowed branch names
    pub fn branches(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }
}

impl Default for BranchFilter {
    fn default() -> Self {
        Self::new(["master"])
    }
}

/// Release version read from the version file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Version(String);

impl Version {
    /// Reads and trims the version file
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DeployVersionRead`] if the file cannot be
    /// read or holds only whitespace.
    pub fn read(path: &Path) -> Result<Self, PipelineError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| PipelineError::DeployVersionRead {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let version = contents.trim();
        if version.is_empty() {
            return Err(PipelineError::DeployVersionRead {
                path: path.to_path_buf(),
                reason: "file is empty".to_string(),
            });
        }

        Ok(Self(version.to_string()))
    }

    /// Version string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which pull failures count as "not yet published"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PullFailurePolicy {
    /// Every pull failure triggers a publish
    #[default]
    AnyFailure,
    /// Only a missing tag triggers a publish; other pull errors fail Deploy
    NotFoundOnly,
}

/// Terminal state of the deploy gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum DeployOutcome {
    /// Branch not eligible; no registry calls were made
    Skipped,
    /// Image pushed as `version` and `latest`
    Published {
        /// Released version
        version: Version,
    },
    /// `version` already existed in the registry; nothing pushed
    AlreadyPublished {
        /// Released version
        version: Version,
    },
}

impl DeployOutcome {
    /// Phase result this outcome maps to
    #[must_use]
    pub fn stage_result(&self) -> StageResult {
        match self {
            Self::Skipped => StageResult::Skipped,
            Self::Published { .. } | Self::AlreadyPublished { .. } => StageResult::Success,
        }
    }
}

impl fmt::Display for DeployOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => write!(f, "skipped"),
            Self::Published { version } => write!(f, "published {version}"),
            Self::AlreadyPublished { version } => write!(f, "{version} already published"),
        }
    }
}

/// Branch filter plus idempotent publish
#[derive(Debug, Clone, Default)]
pub struct DeployGate {
    filter: BranchFilter,
    policy: PullFailurePolicy,
}

impl DeployGate {
    /// Creates a gate for the given branch filter
    #[must_use]
    pub fn new(filter: BranchFilter) -> Self {
        Self {
            filter,
            policy: PullFailurePolicy::default(),
        }
    }

    /// Sets how pull failures are interpreted
    #[must_use]
    pub fn with_policy(mut self, policy: PullFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Branch filter in use
    #[must_use]
    pub fn filter(&self) -> &BranchFilter {
        &self.filter
    }

    /// Publishes `artifact` if `branch` is eligible and the version is new
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DeployVersionRead`] if the version file
    /// cannot be read, and [`PipelineError::DeployPublish`] if a push
    /// fails (or, under [`PullFailurePolicy::NotFoundOnly`], if the pull
    /// fails for a reason other than a missing tag).
    pub async fn deploy_if_eligible(
        &self,
        branch: &str,
        version_file: &Path,
        artifact: &dyn Artifact,
        registry: &Registry,
    ) -> Result<DeployOutcome, PipelineError> {
        let branch = normalize_branch(branch);
        if !self.filter.allows(&branch) {
            info!(branch = %branch, "Branch not eligible for deploy, skipping");
            return Ok(DeployOutcome::Skipped);
        }

        let version = Version::read(version_file)?;
        info!(branch = %branch, version = %version, image = %artifact.id(), "Resolving release");

        match artifact.pull(version.as_str(), registry).await {
            Ok(()) => {
                info!(version = %version, "Version already in registry, not pushing");
                return Ok(DeployOutcome::AlreadyPublished { version });
            }
            Err(err) => self.check_pull_failure(err)?,
        }

        for tag in [version.as_str(), LATEST_TAG] {
            artifact
                .push(tag, registry)
                .await
                .map_err(|e| publish_error(RegistryOperation::Push, e))?;
        }

        info!(version = %version, "Published image");
        Ok(DeployOutcome::Published { version })
    }

    fn check_pull_failure(&self, err: RegistryError) -> Result<(), PipelineError> {
        if err.is_not_found() {
            info!(reference = %err.reference(), "Version not in registry, publishing");
            return Ok(());
        }

        match self.policy {
            PullFailurePolicy::AnyFailure => {
                warn!(
                    error = %err,
                    "Pull failed for a reason other than a missing tag, publishing anyway"
                );
                Ok(())
            }
            PullFailurePolicy::NotFoundOnly => Err(publish_error(RegistryOperation::Pull, err)),
        }
    }
}

fn publish_error(operation: RegistryOperation, err: RegistryError) -> PipelineError {
    let reference = err.reference().to_string();
    PipelineError::DeployPublish {
        operation,
        reference,
        reason: err.to_string(),
    }
}

/// Deploy phase: runs the gate against the artifact published by Build
#[derive(Debug, Clone)]
pub struct DeployPhase {
    gate: DeployGate,
    version_file: PathBuf,
    registry: Registry,
}

impl DeployPhase {
    /// Creates the phase; `version_file` is relative to the workspace
    #[must_use]
    pub fn new(gate: DeployGate, version_file: impl Into<PathBuf>, registry: Registry) -> Self {
        Self {
            gate,
            version_file: version_file.into(),
            registry,
        }
    }
}

#[async_trait]
impl Phase for DeployPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Deploy
    }

    async fn run(&self, ctx: &mut PipelineContext) -> PhaseResult {
        if !self.gate.filter().allows(&ctx.branch) {
            info!(branch = %ctx.branch, "Branch not eligible for deploy, skipping");
            return Ok(StageResult::Skipped);
        }

        let artifact = ctx.artifact(PhaseKind::Deploy)?;
        let version_file = ctx.workspace().join(&self.version_file);

        let outcome = self
            .gate
            .deploy_if_eligible(&ctx.branch, &version_file, &**artifact, &self.registry)
            .await?;

        info!(outcome = %outcome, "Deploy finished");
        Ok(outcome.stage_result())
    }

    fn describe(&self) -> String {
        let branches = self.gate.filter().branches().collect::<Vec<_>>().join(", ");
        format!(
            "Deploy: on [{branches}] publish {} unless already in registry",
            self.version_file.display()
        )
    }
}
