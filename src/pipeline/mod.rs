//! Pipeline domain types and logic
//!
//! A run sequences four phases over one [`PipelineContext`]:
//!
//! - **Setup** provisions the execution environment ([`SetupPhase`])
//! - **Build** builds the container image ([`BuildPhase`])
//! - **Test** runs every check concurrently, fail-slow ([`TestPhase`])
//! - **Deploy** publishes the image when the branch and version allow it
//!   ([`DeployPhase`])

pub mod context;
pub mod deploy;
pub mod errors;
pub mod orchestrator;
pub mod parallel;
pub mod phases;
pub mod project;
pub mod types;


pub use context::PipelineContext;
pub use deploy::{
    BranchFilter, DeployGate, DeployOutcome, DeployPhase, LATEST_TAG, PullFailurePolicy, Version,
    normalize_branch,
};
pub use errors::{
    CheckError, CommandError, PipelineError, RegistryError, RegistryOperation, TaskFailure,
    ValidationError,
};
pub use orchestrator::{Orchestrator, Phase, PhaseRecord, PipelineFailure, PipelineReport};
pub use parallel::{Check, ImageCheck, ParallelTestRunner, ShellCheck, TestPhase};
pub use phases::{BuildPhase, SetupPhase};
pub use project::ProjectPipeline;
pub use types::{PhaseKind, PhaseResult, StageResult, Validate};
