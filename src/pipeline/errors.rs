//! Error types for the pipeline domain

use super::types::PhaseKind;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that end a pipeline run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Setup could not provision the execution environment
    #[error("Setup phase failed: {reason}")]
    Setup {
        /// What went wrong.
        reason: String,
    },

    /// The image could not be built
    #[error("Build phase failed: {reason}")]
    Build {
        /// What went wrong.
        reason: String,
    },

    /// One or more checks failed
    #[error("Test phase failed: {} check(s) failed: {}", failures.len(), TaskFailure::names(failures))]
    Test {
        /// Every failing check, sorted by task name.
        failures: Vec<TaskFailure>,
    },

    /// The version file could not be read
    #[error("Deploy phase could not read version file '{}': {reason}", path.display())]
    DeployVersionRead {
        /// Path of the version file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A registry operation failed while publishing
    #[error("Deploy phase failed to {operation} '{reference}': {reason}")]
    DeployPublish {
        /// Registry operation that failed.
        operation: RegistryOperation,
        /// Image reference involved.
        reference: String,
        /// What went wrong.
        reason: String,
    },

    /// A phase read a context slot that no earlier phase published
    #[error("{phase} phase requires '{slot}' which no earlier phase published")]
    MissingContext {
        /// Phase that performed the read.
        phase: PhaseKind,
        /// Name of the missing slot.
        slot: &'static str,
    },

    /// A context slot was written twice
    #[error("Context slot '{slot}' was already published")]
    ContextSlotTaken {
        /// Name of the slot.
        slot: &'static str,
    },

    /// Validation failed
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl PipelineError {
    /// Returns the phase this error belongs to, if it is phase-specific
    #[must_use]
    pub fn phase(&self) -> Option<PhaseKind> {
        match self {
            Self::Setup { .. } => Some(PhaseKind::Setup),
            Self::Build { .. } => Some(PhaseKind::Build),
            Self::Test { .. } => Some(PhaseKind::Test),
            Self::DeployVersionRead { .. } | Self::DeployPublish { .. } => Some(PhaseKind::Deploy),
            Self::MissingContext { phase, .. } => Some(*phase),
            Self::ContextSlotTaken { .. } | Self::Validation(_) => None,
        }
    }
}

/// A single failing check in the Test phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    /// Name of the check.
    pub task: String,
    /// Why it failed.
    pub reason: String,
}

impl TaskFailure {
    /// Creates a new task failure
    #[must_use]
    pub fn new(task: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            reason: reason.into(),
        }
    }

    fn names(failures: &[Self]) -> String {
        failures
            .iter()
            .map(|f| f.task.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.task, self.reason)
    }
}

/// Registry operations surfaced in deploy failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryOperation {
    /// Probe for an existing tag
    Pull,
    /// Publish a tag
    Push,
}

impl fmt::Display for RegistryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pull => write!(f, "pull"),
            Self::Push => write!(f, "push"),
        }
    }
}

/// Validation errors for pipeline configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Name cannot be empty
    #[error("Name cannot be empty")]
    EmptyName,

    /// Two checks share a name
    #[error("Duplicate check name: '{0}'")]
    DuplicateTask(String),

    /// A required field was left empty
    #[error("'{field}' cannot be empty")]
    EmptyField {
        /// Name of the field.
        field: &'static str,
    },

    /// Check has nothing to run
    #[error("Check '{0}' has no command")]
    EmptyCheck(String),
}

/// Errors from running a command in an execution environment
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The process could not be started
    #[error("Failed to start '{command}': {reason}")]
    Spawn {
        /// Command line.
        command: String,
        /// What went wrong.
        reason: String,
    },

    /// The process exited with a nonzero code
    #[error("Command '{command}' failed with exit code {code}: {stderr}")]
    Failed {
        /// Command line.
        command: String,
        /// Exit code, `-1` when killed by a signal.
        code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// The process did not finish in time
    #[error("Command '{command}' timed out after {duration:?}")]
    Timeout {
        /// Command line.
        command: String,
        /// Configured limit.
        duration: std::time::Duration,
    },
}

/// Errors from registry pull and push operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The tag does not exist in the registry
    #[error("'{reference}' not found in registry")]
    NotFound {
        /// Image reference.
        reference: String,
    },

    /// The registry refused our credentials
    #[error("Registry denied access to '{reference}': {reason}")]
    Auth {
        /// Image reference.
        reference: String,
        /// Registry message.
        reason: String,
    },

    /// Network, daemon or any other failure
    #[error("Registry operation on '{reference}' failed: {reason}")]
    Transport {
        /// Image reference.
        reference: String,
        /// What went wrong.
        reason: String,
    },
}

impl RegistryError {
    /// Returns true if the tag is known to be absent
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the image reference involved
    #[must_use]
    pub fn reference(&self) -> &str {
        match self {
            Self::NotFound { reference }
            | Self::Auth { reference, .. }
            | Self::Transport { reference, .. } => reference,
        }
    }
}

/// Errors from a single check
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    /// The check's command failed
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The check needed context an earlier phase did not publish
    #[error("Missing '{0}' in pipeline context")]
    MissingContext(&'static str),

    /// The check panicked
    #[error("Check panicked: {0}")]
    Panicked(String),
}
