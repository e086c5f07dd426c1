//! # groovylint-ci - Build, test and publish the groovylint image
//!
//! A four-phase pipeline for a container image that bundles linters:
//!
//! 1. **Setup** creates an isolated Python virtualenv and installs the
//!    development requirements.
//! 2. **Build** builds the container image.
//! 3. **Test** runs every linter concurrently (flake8, pydocstyle, pylint,
//!    and groovylint through the freshly built image). One failing linter
//!    never stops the others; all failures are reported together.
//! 4. **Deploy** publishes the image, but only on the release branch and
//!    only if the version in the `VERSION` file is not already in the
//!    registry.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use groovylint_ci::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let mut ctx = PipelineContext::new(".", normalize_branch("origin/master"));
//! let pipeline = ProjectPipeline::local(&config, &ctx)?;
//! let report = pipeline.run(&mut ctx).await?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of
//! - Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <https://www.apache.org/licenses/LICENSE-2.0>)
//! - MIT license ([LICENSE-MIT](LICENSE-MIT) or <https://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod executor;
pub mod infrastructure;
pub mod pipeline;

// Prelude module for common imports
pub mod prelude;

// Re-export commonly used types
pub use executor::{
    Artifact, Environment, EnvironmentProvider, ImageBuilder, LocalEnvironmentProvider, Registry,
    RuntimeSpec, ShellCommand, ShellConfig, ShellResult, expand_variables,
};
pub use infrastructure::{
    CheckSpec, Config, ContainerCli, ContainerRuntime, MetricsCollector, PhaseMetrics,
    init_logging,
};
pub use pipeline::{
    BranchFilter, DeployGate, DeployOutcome, Orchestrator, Phase, PhaseKind, PipelineContext,
    PipelineError, PipelineReport, ProjectPipeline, StageResult, Validate, normalize_branch,
};

/// Version of the groovylint-ci crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
