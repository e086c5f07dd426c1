//! CLI for groovylint-ci
//!
//! - `run`: execute the pipeline (or show its plan with `--dry-run`)
//! - `config`: print the effective configuration
//! - `branch`: show how a branch name normalizes and whether it deploys
//! - `completions`: generate shell completions

pub mod completions;
mod report;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use groovylint_ci::infrastructure::{Config, ContainerCli, HealthStatus, MetricsCollector, init_logging};
use groovylint_ci::pipeline::{
    BranchFilter, Orchestrator, PipelineContext, ProjectPipeline, normalize_branch,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variables consulted for the branch, in order
const BRANCH_ENV_VARS: [&str; 2] = ["BRANCH_NAME", "GIT_BRANCH"];

/// CLI arguments for groovylint-ci
#[derive(Parser, Debug)]
#[command(name = "groovylint-ci")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (default: groovylint-ci.yaml in the workspace)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Repository checkout to operate on
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Log level, overriding the configured one
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run Setup, Build, Test and Deploy
    Run {
        /// Branch being built (default: $BRANCH_NAME, then $GIT_BRANCH)
        #[arg(short, long)]
        branch: Option<String>,
        /// Show what would run without running it
        #[arg(long)]
        dry_run: bool,
        /// Report format
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },

    /// Print the effective configuration as YAML
    Config,

    /// Normalize a branch name and tell whether it is deployed
    Branch {
        /// Branch identifier, e.g. origin/master
        name: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: ShellArg,
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ShellArg {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Build the CLI command for completion generation
pub fn build_cli() -> clap::Command {
    Args::command()
}

/// Parse and execute CLI arguments
pub fn run() -> Result<()> {
    let args = Args::parse();

    let workspace = resolve_workspace(args.workspace)?;

    match args.command {
        Command::Run {
            branch,
            dry_run,
            format,
        } => {
            let config = load_config(args.config.as_deref(), &workspace, args.log_level.as_deref())?;
            let branch = resolve_branch(branch)?;
            run_pipeline(&config, &workspace, &branch, dry_run, format)?;
        }
        Command::Config => {
            let config = load_config(args.config.as_deref(), &workspace, args.log_level.as_deref())?;
            print!("{}", config.to_yaml().context("Failed to serialize config")?);
        }
        Command::Branch { name } => {
            let config = load_config(args.config.as_deref(), &workspace, args.log_level.as_deref())?;
            let filter = BranchFilter::new(&config.deploy_branches);
            let normalized = normalize_branch(&name);
            let verdict = if filter.allows(&normalized) {
                "deploys"
            } else {
                "does not deploy"
            };
            println!("{normalized} ({verdict})");
        }
        Command::Completions { shell, output } => {
            use clap_complete::Shell;

            let shell_enum = match shell {
                ShellArg::Bash => Shell::Bash,
                ShellArg::Zsh => Shell::Zsh,
                ShellArg::Fish => Shell::Fish,
                ShellArg::PowerShell => Shell::PowerShell,
            };

            let completions = completions::generate_completions(shell_enum)?;

            if let Some(output_path) = output {
                completions::save_completions(&completions, &output_path)?;
            } else {
                println!("{completions}");
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>, workspace: &Path, log_level: Option<&str>) -> Result<Config> {
    let config = Config::discover(path, workspace).context("Failed to load configuration")?;
    init_logging(log_level.unwrap_or(&config.log_level));
    Ok(config)
}

/// Absolute, symlink-free workspace path (current directory by default)
fn resolve_workspace(flag: Option<PathBuf>) -> Result<PathBuf> {
    let path = match flag {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    std::fs::canonicalize(&path)
        .with_context(|| format!("Workspace not found: {}", path.display()))
}

fn resolve_branch(flag: Option<String>) -> Result<String> {
    branch_from(flag, |var| std::env::var(var).ok())
}

fn branch_from(flag: Option<String>, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    let raw = flag
        .or_else(|| {
            BRANCH_ENV_VARS
                .iter()
                .find_map(|var| lookup(*var).filter(|v| !v.trim().is_empty()))
        })
        .with_context(|| {
            format!(
                "Unknown branch: pass --branch or set {}",
                BRANCH_ENV_VARS.join(" or ")
            )
        })?;

    let branch = normalize_branch(&raw);
    tracing::debug!(raw = %raw, branch = %branch, "Resolved branch");
    Ok(branch)
}

fn run_pipeline(
    config: &Config,
    workspace: &Path,
    branch: &str,
    dry_run: bool,
    format: ReportFormat,
) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let metrics = Arc::new(MetricsCollector::new());

    let mut ctx = PipelineContext::new(workspace, branch);
    let pipeline = ProjectPipeline::local(config, &ctx)
        .context("Invalid pipeline configuration")?
        .with_orchestrator(Orchestrator::new().with_metrics(Arc::clone(&metrics)));

    if dry_run {
        for line in pipeline.plan() {
            println!("{line}");
        }
        let cli = ContainerCli::new(config.container_runtime, workspace);
        match runtime.block_on(cli.health_check()) {
            HealthStatus::Healthy => println!("{}: available", cli.runtime()),
            HealthStatus::Degraded { reason } | HealthStatus::Unhealthy { reason } => {
                println!("{}: {reason}", cli.runtime());
            }
        }
        return Ok(());
    }

    match runtime.block_on(pipeline.run(&mut ctx)) {
        Ok(report) => {
            report::print(&report, None, format)?;
            tracing::debug!(
                total_ms = metrics.total_duration(&ctx.run_id).as_millis(),
                "Pipeline finished"
            );
            Ok(())
        }
        Err(failure) => {
            report::print(&failure.report, Some(&failure.error), format)?;
            Err(failure.error.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let args = Args::parse_from([
            "groovylint-ci",
            "run",
            "--branch",
            "origin/master",
            "--dry-run",
            "--format",
            "json",
        ]);

        match args.command {
            Command::Run {
                branch,
                dry_run,
                format,
            } => {
                assert_eq!(branch.as_deref(), Some("origin/master"));
                assert!(dry_run);
                assert_eq!(format, ReportFormat::Json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from(["groovylint-ci", "config", "--workspace", "/src"]);
        assert_eq!(args.workspace, Some(PathBuf::from("/src")));
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_explicit_branch_is_normalized() {
        let branch = resolve_branch(Some("refs/heads/master".to_string())).unwrap();
        assert_eq!(branch, "master");
    }

    #[test]
    fn test_flag_wins_over_environment() {
        let lookup = env(&[("BRANCH_NAME", "develop"), ("GIT_BRANCH", "origin/release")]);
        let branch = branch_from(Some("origin/master".to_string()), lookup).unwrap();
        assert_eq!(branch, "master");
    }

    #[test]
    fn test_branch_name_before_git_branch() {
        let lookup = env(&[("BRANCH_NAME", "develop"), ("GIT_BRANCH", "origin/release")]);
        assert_eq!(branch_from(None, lookup).unwrap(), "develop");

        let lookup = env(&[("GIT_BRANCH", "origin/release")]);
        assert_eq!(branch_from(None, lookup).unwrap(), "release");
    }

    #[test]
    fn test_blank_branch_name_falls_through() {
        let lookup = env(&[("BRANCH_NAME", "  "), ("GIT_BRANCH", "origin/master")]);
        assert_eq!(branch_from(None, lookup).unwrap(), "master");
    }

    #[test]
    fn test_missing_branch_is_error() {
        let err = branch_from(None, env(&[])).unwrap_err();
        assert!(err.to_string().contains("BRANCH_NAME or GIT_BRANCH"), "{err}");
    }

    #[test]
    fn test_workspace_is_made_absolute() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("repo")).unwrap();

        let workspace = resolve_workspace(Some(dir.path().join("repo").join(".."))).unwrap();
        assert!(workspace.is_absolute());
        assert_eq!(workspace, std::fs::canonicalize(dir.path()).unwrap());

        assert!(resolve_workspace(Some(dir.path().join("missing"))).is_err());
    }
}
