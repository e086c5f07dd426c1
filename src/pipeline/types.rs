//! Core types for the pipeline domain
//!
//! This module contains the fundamental types that describe
//! phases and their outcomes.

#![allow(clippy::must_use_candidate)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for phase execution
pub type PhaseResult = std::result::Result<StageResult, super::errors::PipelineError>;

/// The four sequential phases of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    /// Provision the execution environment
    Setup,
    /// Build the container image
    Build,
    /// Run every check concurrently
    Test,
    /// Publish the image when eligible
    Deploy,
}

impl PhaseKind {
    /// All phases in execution order
    pub const ALL: [Self; 4] = [Self::Setup, Self::Build, Self::Test, Self::Deploy];
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup => write!(f, "Setup"),
            Self::Build => write!(f, "Build"),
            Self::Test => write!(f, "Test"),
            Self::Deploy => write!(f, "Deploy"),
        }
    }
}

/// Possible outcomes of a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageResult {
    /// Execution completed successfully
    Success,
    /// Execution failed
    Failure,
    /// Execution was skipped
    Skipped,
}

impl StageResult {
    /// Returns true if result is successful
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if result is a failure
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure)
    }

    /// Returns true if result is skipped
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

impl fmt::Display for StageResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Failure => write!(f, "FAILURE"),
            Self::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Trait for types that can be validated
#[allow(clippy::missing_errors_doc)]
pub trait Validate {
    /// Type of validation error
    type Error;

    /// Validates this type
    fn validate(&self) -> std::result::Result<(), Self::Error>;
}
