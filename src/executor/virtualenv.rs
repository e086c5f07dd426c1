//! Environment providers
//!
//! [`LocalEnvironmentProvider`] provisions either a throwaway Python
//! virtualenv or a plain host shell. Virtualenvs live in a temporary
//! directory that is removed when the last handle is dropped.

use super::shell::{ShellCommand, ShellConfig, ShellResult};
use super::traits::{Environment, EnvironmentProvider, RuntimeSpec};
use crate::pipeline::CommandError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[cfg(windows)]
const VENV_BIN: &str = "Scripts";
#[cfg(not(windows))]
const VENV_BIN: &str = "bin";

/// Provisions environments on the local machine
#[derive(Debug, Clone)]
pub struct LocalEnvironmentProvider {
    workspace: PathBuf,
    env: HashMap<String, String>,
    timeout: Option<Duration>,
}

impl LocalEnvironmentProvider {
    /// Creates a provider whose environments run commands in `workspace`
    #[must_use]
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            env: HashMap::new(),
            timeout: None,
        }
    }

    /// Adds variables visible to every command
    #[must_use]
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    /// Limits how long each command may run
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn shell_config(&self) -> ShellConfig {
        ShellConfig {
            cwd: self.workspace.clone(),
            env: self.env.clone(),
            timeout: self.timeout,
            ..ShellConfig::default()
        }
    }

    async fn create_virtualenv(&self, python: &str) -> Result<VirtualenvEnvironment, CommandError> {
        let dir = tempfile::Builder::new()
            .prefix("groovylint-ci-venv-")
            .tempdir()
            .map_err(|e| CommandError::Spawn {
                command: format!("{python} -m venv"),
                reason: e.to_string(),
            })?;

        let venv_path = dir.path().to_string_lossy().to_string();
        tracing::info!(python = %python, path = %venv_path, "Creating virtualenv");

        let base = self.shell_config();
        ShellCommand::new(&base)
            .exec(python, &["-m", "venv", venv_path.as_str()])
            .await?;

        Ok(VirtualenvEnvironment::new(dir, base))
    }
}

#[async_trait]
impl EnvironmentProvider for LocalEnvironmentProvider {
    async fn create(&self, runtime: &RuntimeSpec) -> Result<Arc<dyn Environment>, CommandError> {
        match runtime {
            RuntimeSpec::Virtualenv { python } => {
                Ok(Arc::new(self.create_virtualenv(python).await?))
            }
            RuntimeSpec::Host => {
                tracing::info!(cwd = %self.workspace.display(), "Using host shell environment");
                Ok(Arc::new(HostEnvironment {
                    config: self.shell_config(),
                }))
            }
        }
    }
}

/// Commands run with a virtualenv activated
#[derive(Debug)]
pub struct VirtualenvEnvironment {
    dir: TempDir,
    config: ShellConfig,
}

impl VirtualenvEnvironment {
    fn new(dir: TempDir, mut config: ShellConfig) -> Self {
        let bin = dir.path().join(VENV_BIN);
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let path = std::env::join_paths(
            std::iter::once(bin).chain(std::env::split_paths(&inherited)),
        )
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| inherited.to_string_lossy().to_string());

        config.env.insert("PATH".to_string(), path);
        config.env.insert(
            "VIRTUAL_ENV".to_string(),
            dir.path().to_string_lossy().to_string(),
        );
        config.env.remove("PYTHONHOME");

        Self { dir, config }
    }

    /// Root directory of the virtualenv
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

#[async_trait]
impl Environment for VirtualenvEnvironment {
    async fn run(&self, command: &str) -> Result<ShellResult, CommandError> {
        ShellCommand::new(&self.config).execute(command).await
    }
}

/// Commands run directly on the host shell
#[derive(Debug)]
pub struct HostEnvironment {
    config: ShellConfig,
}

#[async_trait]
impl Environment for HostEnvironment {
    async fn run(&self, command: &str) -> Result<ShellResult, CommandError> {
        ShellCommand::new(&self.config).execute(command).await
    }
}
