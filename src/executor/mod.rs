//! Execution environments
//!
//! This module contains the collaborator traits the pipeline runs against
//! and the local implementations of the environment provider.

mod shell;
mod traits;
mod virtualenv;

pub use shell::{ShellCommand, ShellConfig, ShellResult, expand_variables};
pub use traits::{Artifact, Environment, EnvironmentProvider, ImageBuilder, Registry, RuntimeSpec};
pub use virtualenv::{HostEnvironment, LocalEnvironmentProvider, VirtualenvEnvironment};
