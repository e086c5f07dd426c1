//! Prelude module for common imports

pub use crate::executor::{
    Artifact, Environment, EnvironmentProvider, ImageBuilder, Registry, RuntimeSpec,
};
pub use crate::infrastructure::{Config, ContainerCli, ContainerRuntime};
pub use crate::pipeline::{
    BranchFilter, Check, DeployGate, DeployOutcome, Orchestrator, Phase, PhaseKind,
    PipelineContext, PipelineError, ProjectPipeline, StageResult, normalize_branch,
};
