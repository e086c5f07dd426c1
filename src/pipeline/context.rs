//! Shared state threaded through the phases of one pipeline run
//!
//! Slot ownership:
//!
//! | Slot          | Written by | Read by       |
//! |---------------|------------|---------------|
//! | `environment` | Setup      | Test          |
//! | `artifact`    | Build      | Test, Deploy  |
//!
//! Each slot can be published once. Reading a slot that was never
//! published is a [`PipelineError::MissingContext`].

use super::errors::PipelineError;
use super::types::PhaseKind;
use crate::executor::{Artifact, Environment};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Context for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Run identifier
    pub run_id: String,

    /// Repository checkout the pipeline operates on
    pub workspace: PathBuf,

    /// Normalized branch being built
    pub branch: String,

    /// Variables exposed to commands
    pub env: HashMap<String, String>,

    environment: Option<Arc<dyn Environment>>,
    artifact: Option<Arc<dyn Artifact>>,
}

impl PipelineContext {
    /// Creates an empty context for a run on `branch` in `workspace`
    #[must_use]
    pub fn new(workspace: impl Into<PathBuf>, branch: impl Into<String>) -> Self {
        let workspace = workspace.into();
        let branch = branch.into();
        let run_id = uuid::Uuid::new_v4().to_string();

        let env = HashMap::from([
            (
                "WORKSPACE".to_string(),
                workspace.to_string_lossy().to_string(),
            ),
            ("BRANCH_NAME".to_string(), branch.clone()),
            ("BUILD_ID".to_string(), run_id.clone()),
        ]);

        Self {
            run_id,
            workspace,
            branch,
            env,
            environment: None,
            artifact: None,
        }
    }

    /// Workspace directory
    #[must_use]
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Publishes the execution environment
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ContextSlotTaken`] if an environment was
    /// already published.
    pub fn set_environment(&mut self, environment: Arc<dyn Environment>) -> Result<(), PipelineError> {
        if self.environment.is_some() {
            return Err(PipelineError::ContextSlotTaken {
                slot: "environment",
            });
        }
        self.environment = Some(environment);
        Ok(())
    }

    /// Publishes the built artifact
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ContextSlotTaken`] if an artifact was
    /// already published.
    pub fn set_artifact(&mut self, artifact: Arc<dyn Artifact>) -> Result<(), PipelineError> {
        if self.artifact.is_some() {
            return Err(PipelineError::ContextSlotTaken { slot: "artifact" });
        }
        self.artifact = Some(artifact);
        Ok(())
    }

    /// Execution environment published by Setup
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingContext`] if Setup did not publish one.
    pub fn environment(&self, reader: PhaseKind) -> Result<&Arc<dyn Environment>, PipelineError> {
        self.environment
            .as_ref()
            .ok_or(PipelineError::MissingContext {
                phase: reader,
                slot: "environment",
            })
    }

    /// Artifact published by Build
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingContext`] if Build did not publish one.
    pub fn artifact(&self, reader: PhaseKind) -> Result<&Arc<dyn Artifact>, PipelineError> {
        self.artifact.as_ref().ok_or(PipelineError::MissingContext {
            phase: reader,
            slot: "artifact",
        })
    }

    /// Execution environment, if published
    #[must_use]
    pub fn try_environment(&self) -> Option<&Arc<dyn Environment>> {
        self.environment.as_ref()
    }

    /// Artifact, if published
    #[must_use]
    pub fn try_artifact(&self) -> Option<&Arc<dyn Artifact>> {
        self.artifact.as_ref()
    }
}
