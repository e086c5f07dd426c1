//! Phase orchestration
//!
//! Runs Setup, Build, Test and Deploy strictly in that order against one
//! shared [`PipelineContext`]. The first failing phase ends the run; the
//! phases after it never start. There is no retry and no rollback.

use super::context::PipelineContext;
use super::errors::PipelineError;
use super::types::{PhaseKind, PhaseResult, StageResult};
use crate::infrastructure::{MetricsCollector, PhaseMetrics};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// One top-level stage of the pipeline
#[async_trait]
pub trait Phase: Send + Sync {
    /// Which phase this is
    fn kind(&self) -> PhaseKind;

    /// Runs the phase, reading and publishing context slots
    async fn run(&self, ctx: &mut PipelineContext) -> PhaseResult;

    /// One-line description used by dry runs
    fn describe(&self) -> String {
        self.kind().to_string()
    }
}

/// Outcome of a single phase in a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseRecord {
    /// Phase
    pub phase: PhaseKind,
    /// How it ended
    pub result: StageResult,
    /// Wall-clock duration
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

/// Summary of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// Run identifier
    pub run_id: String,
    /// Branch that was built
    pub branch: String,
    /// Every phase in order, including skipped ones
    pub phases: Vec<PhaseRecord>,
    /// Error message of the failing phase, if any
    pub error: Option<String>,
}

impl PipelineReport {
    /// Returns true if no phase failed
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Result recorded for `phase`
    #[must_use]
    pub fn result_of(&self, phase: PhaseKind) -> Option<StageResult> {
        self.phases
            .iter()
            .find(|r| r.phase == phase)
            .map(|r| r.result)
    }
}

/// A failed run: the error plus everything recorded up to it
#[derive(Debug, Clone)]
pub struct PipelineFailure {
    /// Error raised by the failing phase
    pub error: PipelineError,
    /// Report with the failing phase and skipped successors
    pub report: PipelineReport,
}

impl std::fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for PipelineFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Sequences the four phases of a pipeline run
#[derive(Default, Clone)]
pub struct Orchestrator {
    metrics: Option<Arc<MetricsCollector>>,
}

impl Orchestrator {
    /// Creates a new orchestrator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records per-phase metrics into `collector`
    #[must_use]
    pub fn with_metrics(mut self, collector: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(collector);
        self
    }

    /// Runs the phases in order against `ctx`
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineFailure`] carrying the first phase error; no
    /// later phase is executed.
    pub async fn run(
        &self,
        ctx: &mut PipelineContext,
        setup: &dyn Phase,
        build: &dyn Phase,
        test: &dyn Phase,
        deploy: &dyn Phase,
    ) -> Result<PipelineReport, PipelineFailure> {
        let phases: [&dyn Phase; 4] = [setup, build, test, deploy];

        info!(
            run_id = %ctx.run_id,
            branch = %ctx.branch,
            workspace = %ctx.workspace.display(),
            "Starting pipeline"
        );

        let mut report = PipelineReport {
            run_id: ctx.run_id.clone(),
            branch: ctx.branch.clone(),
            phases: Vec::with_capacity(phases.len()),
            error: None,
        };

        for (index, phase) in phases.iter().enumerate() {
            let kind = phase.kind();
            info!(phase = %kind, "Executing phase");

            let start = Instant::now();
            let outcome = phase.run(ctx).await;
            let duration = start.elapsed();

            match outcome {
                Ok(result) => {
                    info!(
                        phase = %kind,
                        result = %result,
                        duration_ms = duration.as_millis(),
                        "Phase completed"
                    );
                    self.record(&mut report, kind, result, duration);
                }
                Err(err) => {
                    error!(
                        phase = %kind,
                        duration_ms = duration.as_millis(),
                        error = %err,
                        "Phase failed, stopping pipeline"
                    );
                    self.record(&mut report, kind, StageResult::Failure, duration);
                    for skipped in &phases[index + 1..] {
                        self.record(&mut report, skipped.kind(), StageResult::Skipped, Duration::ZERO);
                    }
                    report.error = Some(err.to_string());
                    return Err(PipelineFailure { error: err, report });
                }
            }
        }

        info!(run_id = %ctx.run_id, "Pipeline succeeded");
        Ok(report)
    }

    /// Lists what [`Orchestrator::run`] would execute, without side effects
    #[must_use]
    pub fn plan(
        &self,
        setup: &dyn Phase,
        build: &dyn Phase,
        test: &dyn Phase,
        deploy: &dyn Phase,
    ) -> Vec<String> {
        [setup, build, test, deploy]
            .iter()
            .map(|phase| {
                let line = phase.describe();
                info!(phase = %phase.kind(), "Would execute: {}", line);
                line
            })
            .collect()
    }

    fn record(
        &self,
        report: &mut PipelineReport,
        phase: PhaseKind,
        result: StageResult,
        duration: Duration,
    ) {
        if let Some(metrics) = &self.metrics {
            metrics.record(PhaseMetrics {
                run_id: report.run_id.clone(),
                phase,
                result,
                duration,
            });
        }
        report.phases.push(PhaseRecord {
            phase,
            result,
            duration,
        });
    }
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}
