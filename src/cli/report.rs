//! Run report rendering for `groovylint-ci run`

use super::ReportFormat;
use anyhow::{Context, Result};
use groovylint_ci::pipeline::{PipelineError, PipelineReport};
use serde_json::json;
use std::fmt::Write;

/// Prints the report to stdout in the requested format
pub fn print(report: &PipelineReport, error: Option<&PipelineError>, format: ReportFormat) -> Result<()> {
    let rendered = match format {
        ReportFormat::Text => render_text(report, error),
        ReportFormat::Json => render_json(report, error)?,
    };
    println!("{rendered}");
    Ok(())
}

fn render_text(report: &PipelineReport, error: Option<&PipelineError>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Pipeline {} on {}", report.run_id, report.branch);

    for record in &report.phases {
        let _ = writeln!(
            out,
            "  {:<8}{:<9}{:.1}s",
            record.phase.to_string(),
            record.result.to_string(),
            record.duration.as_secs_f64()
        );
    }

    if let Some(PipelineError::Test { failures }) = error {
        for failure in failures {
            let _ = writeln!(out, "    - {failure}");
        }
    }

    match &report.error {
        Some(message) => {
            let _ = write!(out, "FAILED: {message}");
        }
        None => out.push_str("PASSED"),
    }
    out
}

fn render_json(report: &PipelineReport, error: Option<&PipelineError>) -> Result<String> {
    let failures: Vec<_> = match error {
        Some(PipelineError::Test { failures }) => failures
            .iter()
            .map(|f| json!({ "task": f.task, "reason": f.reason }))
            .collect(),
        _ => Vec::new(),
    };

    let mut value = serde_json::to_value(report).context("Failed to serialize report")?;
    value["failures"] = json!(failures);
    serde_json::to_string_pretty(&value).context("Failed to serialize report")
}

#[cfg(test)]
mod tests {
    use super::*;
    use groovylint_ci::pipeline::{PhaseKind, PhaseRecord, StageResult, TaskFailure};
    use std::time::Duration;

    fn failed_report() -> (PipelineReport, PipelineError) {
        let error = PipelineError::Test {
            failures: vec![
                TaskFailure::new("flake8", "exit code 1"),
                TaskFailure::new("pylint", "exit code 2"),
            ],
        };
        let record = |phase, result, ms| PhaseRecord {
            phase,
            result,
            duration: Duration::from_millis(ms),
        };
        let report = PipelineReport {
            run_id: "run-1".to_string(),
            branch: "master".to_string(),
            phases: vec![
                record(PhaseKind::Setup, StageResult::Success, 1500),
                record(PhaseKind::Build, StageResult::Success, 200),
                record(PhaseKind::Test, StageResult::Failure, 3000),
                record(PhaseKind::Deploy, StageResult::Skipped, 0),
            ],
            error: Some(error.to_string()),
        };
        (report, error)
    }

    #[test]
    fn test_text_lists_phases_and_failures() {
        let (report, error) = failed_report();
        let text = render_text(&report, Some(&error));

        assert!(text.starts_with("Pipeline run-1 on master\n"));
        assert!(text.contains("  Setup   SUCCESS  1.5s\n"));
        assert!(text.contains("  Deploy  SKIPPED  0.0s\n"));
        assert!(text.contains("    - flake8: exit code 1\n"));
        assert!(text.ends_with("FAILED: Test phase failed: 2 check(s) failed: flake8, pylint"));
    }

    #[test]
    fn test_json_includes_failures() {
        let (report, error) = failed_report();
        let value: serde_json::Value =
            serde_json::from_str(&render_json(&report, Some(&error)).unwrap()).unwrap();

        assert_eq!(value["phases"][0]["phase"], "setup");
        assert_eq!(value["phases"][0]["duration"], 1500);
        assert_eq!(value["failures"][1]["task"], "pylint");
    }
}
