//! Infrastructure layer
//!
//! This module contains external integrations and adapters.

mod config;
pub mod container;
mod logging;
mod metrics;

pub use config::{CheckSpec, Config, ConfigError, DEFAULT_CONFIG_FILE};
pub use container::{ContainerCli, ContainerImage, ContainerRuntime, HealthStatus};
pub use logging::init_logging;
pub use metrics::{MetricsCollector, PhaseMetrics};
