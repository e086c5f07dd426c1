//! Container image builder (Docker/Podman)
//!
//! Builds, runs, pulls and pushes images by shelling out to the container
//! runtime's CLI. Registry credentials are whatever the CLI is already
//! logged in with.

use crate::executor::{Artifact, ImageBuilder, Registry, ShellCommand, ShellConfig, ShellResult};
use crate::pipeline::{CommandError, RegistryError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Container runtime type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    /// Docker runtime
    #[default]
    Docker,
    /// Podman runtime
    Podman,
}

impl ContainerRuntime {
    /// Executable name
    #[must_use]
    pub fn command(self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

impl std::fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command())
    }
}

/// Health status of the container runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Runtime and daemon respond
    Healthy,

    /// CLI is installed but the daemon does not respond
    Degraded {
        /// Reason for degradation
        reason: String,
    },

    /// CLI is missing
    Unhealthy {
        /// Reason for being unhealthy
        reason: String,
    },
}

/// Drives a container runtime CLI
#[derive(Debug, Clone)]
pub struct ContainerCli {
    runtime: ContainerRuntime,
    build_context: PathBuf,
    shell: ShellConfig,
}

impl ContainerCli {
    /// Creates a CLI driver operating from `workspace`
    #[must_use]
    pub fn new(runtime: ContainerRuntime, workspace: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            build_context: PathBuf::from("."),
            shell: ShellConfig {
                cwd: workspace.into(),
                ..ShellConfig::default()
            },
        }
    }

    /// Sets the directory passed to `build`, relative to the workspace
    #[must_use]
    pub fn with_build_context(mut self, context: impl Into<PathBuf>) -> Self {
        self.build_context = context.into();
        self
    }

    /// Limits how long each CLI invocation may run
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.shell.timeout = timeout;
        self
    }

    /// Runtime in use
    #[must_use]
    pub fn runtime(&self) -> ContainerRuntime {
        self.runtime
    }

    async fn invoke(&self, args: &[&str]) -> Result<ShellResult, CommandError> {
        ShellCommand::new(&self.shell)
            .exec(self.runtime.command(), args)
            .await
    }

    /// Checks whether the runtime CLI and daemon respond
    pub async fn health_check(&self) -> HealthStatus {
        if let Err(e) = self.invoke(&["--version"]).await {
            return HealthStatus::Unhealthy {
                reason: format!("{} is not available: {e}", self.runtime),
            };
        }

        match self.invoke(&["info"]).await {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Degraded {
                reason: format!("{} daemon may not be running: {e}", self.runtime),
            },
        }
    }
}

#[async_trait]
impl ImageBuilder for ContainerCli {
    async fn build(&self, image_name: &str) -> Result<Arc<dyn Artifact>, CommandError> {
        let context = self.build_context.to_string_lossy().to_string();
        tracing::info!(
            runtime = %self.runtime,
            image = %image_name,
            context = %context,
            "Building image"
        );

        self.invoke(&["build", "-t", image_name, context.as_str()])
            .await?;

        Ok(Arc::new(ContainerImage {
            name: image_name.to_string(),
            source: context,
            cli: self.clone(),
        }))
    }
}

/// An image built by [`ContainerCli`]
#[derive(Debug, Clone)]
pub struct ContainerImage {
    name: String,
    source: String,
    cli: ContainerCli,
}

#[async_trait]
impl Artifact for ContainerImage {
    fn id(&self) -> &str {
        &self.name
    }

    fn source(&self) -> &str {
        &self.source
    }

    async fn pull(&self, tag: &str, registry: &Registry) -> Result<(), RegistryError> {
        let reference = registry.reference(&self.name, tag);
        tracing::debug!(reference = %reference, "Pulling image");

        self.cli
            .invoke(&["pull", reference.as_str()])
            .await
            .map(|_| ())
            .map_err(|e| classify_registry_error(reference, &e))
    }

    async fn push(&self, tag: &str, registry: &Registry) -> Result<(), RegistryError> {
        let reference = registry.reference(&self.name, tag);
        tracing::info!(reference = %reference, "Pushing image");

        self.cli
            .invoke(&["tag", self.name.as_str(), reference.as_str()])
            .await
            .map_err(|e| classify_registry_error(reference.clone(), &e))?;

        self.cli
            .invoke(&["push", reference.as_str()])
            .await
            .map(|_| ())
            .map_err(|e| classify_registry_error(reference, &e))
    }

    async fn run(&self, args: &[String], workspace: &Path) -> Result<ShellResult, CommandError> {
        let mount = volume_mount(workspace)?;
        let mut argv = vec!["run", "--rm", "-v", mount.as_str(), "-w", "/ws", self.name.as_str()];
        argv.extend(args.iter().map(String::as_str));

        self.cli.invoke(&argv).await
    }
}

/// Bind mount of `workspace` at `/ws`
///
/// The path is made absolute first: a bare relative name would be taken
/// as a named volume.
fn volume_mount(workspace: &Path) -> Result<String, CommandError> {
    let absolute = std::path::absolute(workspace).map_err(|e| CommandError::Spawn {
        command: format!("mount {}", workspace.display()),
        reason: e.to_string(),
    })?;
    Ok(format!("{}:/ws", absolute.display()))
}

/// Maps a failed CLI invocation to a registry error
///
/// Missing tags and missing repositories are `NotFound`; credential
/// problems are `Auth`; everything else is `Transport`.
fn classify_registry_error(reference: String, err: &CommandError) -> RegistryError {
    let message = match err {
        CommandError::Failed { stderr, .. } => stderr.trim().to_string(),
        other => other.to_string(),
    };
    let lowered = message.to_lowercase();

    if matches!(err, CommandError::Failed { .. })
        && (lowered.contains("manifest unknown")
            || lowered.contains("not found")
            || lowered.contains("repository does not exist"))
    {
        RegistryError::NotFound { reference }
    } else if lowered.contains("unauthorized")
        || lowered.contains("denied")
        || lowered.contains("authentication required")
    {
        RegistryError::Auth {
            reference,
            reason: message,
        }
    } else {
        RegistryError::Transport {
            reference,
            reason: message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stderr: &str) -> CommandError {
        CommandError::Failed {
            command: "docker pull img:1.0".to_string(),
            code: 1,
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_runtime_command() {
        assert_eq!(ContainerRuntime::Docker.command(), "docker");
        assert_eq!(ContainerRuntime::Podman.to_string(), "podman");
        assert_eq!(ContainerRuntime::default(), ContainerRuntime::Docker);
    }

    #[test]
    fn test_classify_missing_tag() {
        let err = classify_registry_error(
            "img:1.0".to_string(),
            &failed("Error response from daemon: manifest for img:1.0 not found: manifest unknown"),
        );
        assert_eq!(
            err,
            RegistryError::NotFound {
                reference: "img:1.0".to_string()
            }
        );
    }

    #[test]
    fn test_classify_missing_repository() {
        let err = classify_registry_error(
            "img:1.0".to_string(),
            &failed("pull access denied for img, repository does not exist or may require 'docker login'"),
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn test_classify_auth() {
        let err = classify_registry_error(
            "img:1.0".to_string(),
            &failed("unauthorized: incorrect username or password"),
        );
        assert!(matches!(err, RegistryError::Auth { .. }));
    }

    #[test]
    fn test_classify_transport() {
        let err = classify_registry_error(
            "img:1.0".to_string(),
            &failed("dial tcp: lookup registry-1.docker.io: no such host"),
        );
        assert!(matches!(err, RegistryError::Transport { .. }));

        let err = classify_registry_error(
            "img:1.0".to_string(),
            &CommandError::Spawn {
                command: "docker pull img:1.0".to_string(),
                reason: "No such file or directory (os error 2)".to_string(),
            },
        );
        assert!(matches!(err, RegistryError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_missing_runtime_is_unhealthy() {
        let workspace = tempfile::tempdir().unwrap();
        let cli = ContainerCli::new(ContainerRuntime::Docker, workspace.path());

        let status = cli.health_check().await;
        // Depends on whether the host has docker installed
        assert!(
            matches!(status, HealthStatus::Healthy)
                || matches!(status, HealthStatus::Degraded { .. })
                || matches!(status, HealthStatus::Unhealthy { .. })
        );
    }

    #[test]
    fn test_relative_workspace_is_bind_mounted() {
        let mount = volume_mount(Path::new("repo")).unwrap();
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(mount, format!("{}:/ws", cwd.join("repo").display()));

        assert_eq!(volume_mount(Path::new("/src")).unwrap(), "/src:/ws");
    }

    #[test]
    fn test_build_context_builder() {
        let cli = ContainerCli::new(ContainerRuntime::Podman, "/src").with_build_context("docker");
        assert_eq!(cli.runtime(), ContainerRuntime::Podman);
        assert_eq!(cli.build_context, PathBuf::from("docker"));
    }
}
