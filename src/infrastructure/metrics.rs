//! Metrics collection
//!
//! Records the result and duration of each phase of each run.

use crate::pipeline::{PhaseKind, StageResult};
use parking_lot::RwLock;
use std::time::Duration;

/// Metrics for one phase of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseMetrics {
    /// Run the phase belongs to
    pub run_id: String,

    /// Phase
    pub phase: PhaseKind,

    /// How the phase ended
    pub result: StageResult,

    /// Execution duration
    pub duration: Duration,
}

/// Metrics collector for pipeline runs
#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: RwLock<Vec<PhaseMetrics>>,
}

impl MetricsCollector {
    /// Creates a new metrics collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records metrics for a phase
    pub fn record(&self, metrics: PhaseMetrics) {
        self.metrics.write().push(metrics);
    }

    /// Metrics of one run, in execution order
    #[must_use]
    pub fn for_run(&self, run_id: &str) -> Vec<PhaseMetrics> {
        self.metrics
            .read()
            .iter()
            .filter(|m| m.run_id == run_id)
            .cloned()
            .collect()
    }

    /// Total time spent in recorded phases of a run
    #[must_use]
    pub fn total_duration(&self, run_id: &str) -> Duration {
        self.for_run(run_id).iter().map(|m| m.duration).sum()
    }
}
