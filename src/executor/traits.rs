//! Collaborator traits
//!
//! The pipeline talks to the outside world through these seams: an
//! isolated environment for running commands, and an image builder whose
//! artifacts can be pulled and pushed by tag.

use crate::pipeline::{CommandError, RegistryError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::shell::ShellResult;

/// How the isolated execution environment is provisioned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RuntimeSpec {
    /// A Python virtualenv created with the given interpreter
    Virtualenv {
        /// Interpreter used to create the virtualenv
        python: String,
    },
    /// Commands run directly on the host shell
    Host,
}

impl Default for RuntimeSpec {
    fn default() -> Self {
        Self::Virtualenv {
            python: "python3.6".to_string(),
        }
    }
}

impl fmt::Display for RuntimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Virtualenv { python } => write!(f, "virtualenv({python})"),
            Self::Host => write!(f, "host"),
        }
    }
}

/// An isolated, disposable environment for running commands
#[async_trait]
pub trait Environment: Send + Sync + fmt::Debug {
    /// Runs a shell command, failing on nonzero exit
    async fn run(&self, command: &str) -> Result<ShellResult, CommandError>;
}

/// Creates execution environments
#[async_trait]
pub trait EnvironmentProvider: Send + Sync {
    /// Provisions a new environment for the given runtime
    async fn create(&self, runtime: &RuntimeSpec) -> Result<Arc<dyn Environment>, CommandError>;
}

/// Registry endpoint passed through to artifact operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    /// Registry URL; `None` means the container runtime's default registry
    #[serde(default)]
    pub url: Option<String>,
}

impl Registry {
    /// Creates a registry for the given URL
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }

    /// Host to prefix image references with, if any
    ///
    /// Docker Hub hosts are left implicit so references stay in their
    /// short `namespace/name` form.
    #[must_use]
    pub fn host(&self) -> Option<String> {
        let url = self.url.as_deref()?;
        // `host:port` parses as a URL with `host` as its scheme
        let parsed = if url.contains("://") {
            url::Url::parse(url)
        } else {
            url::Url::parse(&format!("https://{url}"))
        }
        .ok()?;
        let host = parsed.host_str()?;
        if host == "docker.io" || host.ends_with(".docker.io") || host.ends_with(".docker.com") {
            return None;
        }
        Some(match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    /// Qualifies `name:tag` with the registry host
    #[must_use]
    pub fn reference(&self, name: &str, tag: &str) -> String {
        match self.host() {
            Some(host) if !name.starts_with(&format!("{host}/")) => format!("{host}/{name}:{tag}"),
            _ => format!("{name}:{tag}"),
        }
    }
}

/// A built container image
#[async_trait]
pub trait Artifact: Send + Sync + fmt::Debug {
    /// Image identifier, fixed once the build completes
    fn id(&self) -> &str;

    /// Build context the image was produced from
    fn source(&self) -> &str;

    /// Pulls `id:tag` from the registry
    async fn pull(&self, tag: &str, registry: &Registry) -> Result<(), RegistryError>;

    /// Tags the image as `id:tag` and pushes it
    async fn push(&self, tag: &str, registry: &Registry) -> Result<(), RegistryError>;

    /// Runs the image with the given arguments, mounting the workspace
    async fn run(
        &self,
        args: &[String],
        workspace: &std::path::Path,
    ) -> Result<ShellResult, CommandError>;
}

/// Builds container images
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Builds `image_name` and returns its artifact handle
    async fn build(&self, image_name: &str) -> Result<Arc<dyn Artifact>, CommandError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_spec_default_is_virtualenv() {
        assert_eq!(
            RuntimeSpec::default(),
            RuntimeSpec::Virtualenv {
                python: "python3.6".to_string()
            }
        );
        assert_eq!(RuntimeSpec::default().to_string(), "virtualenv(python3.6)");
    }

    #[test]
    fn test_runtime_spec_yaml() {
        let spec: RuntimeSpec = serde_yaml::from_str("kind: host").unwrap();
        assert_eq!(spec, RuntimeSpec::Host);

        let spec: RuntimeSpec = serde_yaml::from_str("kind: virtualenv\npython: python3.9").unwrap();
        assert_eq!(
            spec,
            RuntimeSpec::Virtualenv {
                python: "python3.9".to_string()
            }
        );
    }

    #[test]
    fn test_docker_hub_is_implicit() {
        let registry = Registry::new("https://registry.hub.docker.com");
        assert_eq!(registry.host(), None);
        assert_eq!(
            registry.reference("abletonag/groovylint", "1.0"),
            "abletonag/groovylint:1.0"
        );
    }

    #[test]
    fn test_private_registry_prefixes_host() {
        let registry = Registry::new("https://registry.example.com:5000");
        assert_eq!(registry.host().as_deref(), Some("registry.example.com:5000"));
        assert_eq!(
            registry.reference("tools/groovylint", "latest"),
            "registry.example.com:5000/tools/groovylint:latest"
        );
    }

    #[test]
    fn test_registry_without_scheme() {
        let registry = Registry::new("ghcr.io");
        assert_eq!(registry.reference("org/img", "1"), "ghcr.io/org/img:1");
    }

    #[test]
    fn test_registry_host_port_without_scheme() {
        let registry = Registry::new("localhost:5000");
        assert_eq!(registry.host().as_deref(), Some("localhost:5000"));

        let registry = Registry::new("registry.example.com:5000");
        assert_eq!(
            registry.reference("abletonag/groovylint", "2.3.1"),
            "registry.example.com:5000/abletonag/groovylint:2.3.1"
        );
    }

    #[test]
    fn test_default_registry() {
        let registry = Registry::default();
        assert_eq!(registry.reference("img", "latest"), "img:latest");
    }
}
