//! Configuration management
//!
//! Pipeline settings are read from `groovylint-ci.yaml` in the workspace.
//! Every field has a default, so a missing file or a partial file both
//! work.

use super::container::ContainerRuntime;
use crate::executor::{Registry, RuntimeSpec};
use crate::pipeline::{PullFailurePolicy, Validate, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "groovylint-ci.yaml";

/// Errors loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config '{}': {source}", path.display())]
    Read {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid YAML for [`Config`]
    #[error("Failed to parse config '{}': {source}", path.display())]
    Parse {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        source: serde_yaml::Error,
    },

    /// The configuration is inconsistent
    #[error("Invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

/// What a configured check runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckSpec {
    /// Command run in the Setup environment
    Shell(String),
    /// Arguments passed to the built image
    Image(Vec<String>),
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Image name to build and publish
    pub image: String,
    /// Directory passed to the image build, relative to the workspace
    pub build_context: PathBuf,
    /// File holding the release version, relative to the workspace
    pub version_file: PathBuf,
    /// Branches on which Deploy runs
    pub deploy_branches: Vec<String>,
    /// Registry images are pulled from and pushed to
    pub registry: Registry,
    /// Container runtime CLI
    pub container_runtime: ContainerRuntime,
    /// Execution environment for setup commands and shell checks
    pub runtime: RuntimeSpec,
    /// Commands run in the environment during Setup
    pub setup: Vec<String>,
    /// Checks run concurrently during Test, written `name: { shell: cmd }`
    /// or `name: { image: [args] }`
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub checks: BTreeMap<String, CheckSpec>,
    /// How pull failures are interpreted during Deploy
    pub pull_failure_policy: PullFailurePolicy,
    /// Per-command time limit in seconds
    pub command_timeout_secs: Option<u64>,
    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image: "abletonag/groovylint".to_string(),
            build_context: PathBuf::from("."),
            version_file: PathBuf::from("VERSION"),
            deploy_branches: vec!["master".to_string()],
            registry: Registry::new("https://registry.hub.docker.com"),
            container_runtime: ContainerRuntime::Docker,
            runtime: RuntimeSpec::default(),
            setup: vec!["pip install -r requirements-dev.txt".to_string()],
            checks: BTreeMap::from([
                ("flake8".to_string(), CheckSpec::Shell("flake8 -v".to_string())),
                (
                    "groovylint".to_string(),
                    CheckSpec::Image(vec!["./Jenkinsfile".to_string()]),
                ),
                (
                    "pydocstyle".to_string(),
                    CheckSpec::Shell("pydocstyle -v".to_string()),
                ),
                (
                    "pylint".to_string(),
                    CheckSpec::Shell("pylint --max-line-length=90 *.py".to_string()),
                ),
            ]),
            pull_failure_policy: PullFailurePolicy::AnyFailure,
            command_timeout_secs: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads and validates a config file
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Loads `path` if given, else the default file in `workspace` if it
    /// exists, else the built-in defaults
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`]; an explicitly given path must exist.
    pub fn discover(path: Option<&Path>, workspace: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let default_path = workspace.join(DEFAULT_CONFIG_FILE);
        if default_path.is_file() {
            return Self::load(&default_path);
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Parses YAML without validating
    ///
    /// # Errors
    ///
    /// Returns the parse error.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Serializes to YAML
    ///
    /// # Errors
    ///
    /// Returns the serialization error.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Per-command time limit
    #[must_use]
    pub fn command_timeout(&self) -> Option<std::time::Duration> {
        self.command_timeout_secs.map(std::time::Duration::from_secs)
    }
}

impl Validate for Config {
    type Error = ValidationError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.image.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "image" });
        }
        if self.version_file.as_os_str().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "version_file",
            });
        }
        if self.deploy_branches.iter().all(|b| b.trim().is_empty()) {
            return Err(ValidationError::EmptyField {
                field: "deploy_branches",
            });
        }
        for (name, check) in &self.checks {
            if name.trim().is_empty() {
                return Err(ValidationError::EmptyName);
            }
            let empty = match check {
                CheckSpec::Shell(command) => command.trim().is_empty(),
                CheckSpec::Image(args) => args.is_empty(),
            };
            if empty {
                return Err(ValidationError::EmptyCheck(name.clone()));
            }
        }
        Ok(())
    }
}
