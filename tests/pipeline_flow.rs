//! End-to-end pipeline runs against in-memory collaborators

use async_trait::async_trait;
use groovylint_ci::executor::{
    Artifact, Environment, EnvironmentProvider, ImageBuilder, Registry, RuntimeSpec, ShellResult,
};
use groovylint_ci::pipeline::{
    CommandError, PhaseKind, PipelineContext, PipelineError, ProjectPipeline, RegistryError,
    StageResult,
};
use groovylint_ci::{Config, MetricsCollector, Orchestrator};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Everything the fakes were asked to do, in order
#[derive(Debug, Default)]
struct World {
    calls: Mutex<Vec<String>>,
    failing_commands: BTreeSet<String>,
    published: BTreeSet<String>,
    broken_build: bool,
}

impl World {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }
}

#[derive(Debug)]
struct FakeEnvironment(Arc<World>);

#[async_trait]
impl Environment for FakeEnvironment {
    async fn run(&self, command: &str) -> Result<ShellResult, CommandError> {
        self.0.record(format!("sh {command}"));
        if self.0.failing_commands.contains(command) {
            return Err(CommandError::Failed {
                command: command.to_string(),
                code: 1,
                stderr: "lint errors".to_string(),
            });
        }
        Ok(ShellResult::default())
    }
}

struct FakeProvider(Arc<World>);

#[async_trait]
impl EnvironmentProvider for FakeProvider {
    async fn create(&self, runtime: &RuntimeSpec) -> Result<Arc<dyn Environment>, CommandError> {
        self.0.record(format!("create {runtime}"));
        Ok(Arc::new(FakeEnvironment(Arc::clone(&self.0))))
    }
}

#[derive(Debug)]
struct FakeImage {
    name: String,
    world: Arc<World>,
}

#[async_trait]
impl Artifact for FakeImage {
    fn id(&self) -> &str {
        &self.name
    }

    fn source(&self) -> &str {
        "."
    }

    async fn pull(&self, tag: &str, registry: &Registry) -> Result<(), RegistryError> {
        self.world.record(format!("pull {tag}"));
        if self.world.published.contains(tag) {
            return Ok(());
        }
        Err(RegistryError::NotFound {
            reference: registry.reference(&self.name, tag),
        })
    }

    async fn push(&self, tag: &str, _registry: &Registry) -> Result<(), RegistryError> {
        self.world.record(format!("push {tag}"));
        Ok(())
    }

    async fn run(&self, args: &[String], _workspace: &Path) -> Result<ShellResult, CommandError> {
        self.world.record(format!("image {}", args.join(" ")));
        Ok(ShellResult::default())
    }
}

struct FakeBuilder(Arc<World>);

#[async_trait]
impl ImageBuilder for FakeBuilder {
    async fn build(&self, image_name: &str) -> Result<Arc<dyn Artifact>, CommandError> {
        self.0.record(format!("build {image_name}"));
        if self.0.broken_build {
            return Err(CommandError::Failed {
                command: format!("docker build -t {image_name} ."),
                code: 1,
                stderr: "syntax error in Dockerfile".to_string(),
            });
        }
        Ok(Arc::new(FakeImage {
            name: image_name.to_string(),
            world: Arc::clone(&self.0),
        }))
    }
}

fn workspace(version: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("VERSION"), version).unwrap();
    dir
}

fn pipeline(world: &Arc<World>) -> ProjectPipeline {
    ProjectPipeline::with_collaborators(
        &Config::default(),
        Arc::new(FakeProvider(Arc::clone(world))),
        Arc::new(FakeBuilder(Arc::clone(world))),
    )
    .unwrap()
}

#[tokio::test]
async fn test_master_build_publishes_new_version() {
    let world = Arc::new(World::default());
    let dir = workspace("0.2.1\n");
    let mut ctx = PipelineContext::new(dir.path(), "master");

    let report = pipeline(&world).run(&mut ctx).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.result_of(PhaseKind::Deploy), Some(StageResult::Success));
    assert_eq!(
        world.calls()[..3].to_vec(),
        vec![
            "create virtualenv(python3.6)",
            "sh pip install -r requirements-dev.txt",
            "build abletonag/groovylint",
        ]
    );
    let calls = world.calls();
    assert_eq!(
        calls[calls.len() - 3..].to_vec(),
        vec!["pull 0.2.1", "push 0.2.1", "push latest"]
    );
}

#[tokio::test]
async fn test_existing_version_is_not_pushed() {
    let world = Arc::new(World {
        published: BTreeSet::from(["0.2.1".to_string()]),
        ..World::default()
    });
    let dir = workspace("0.2.1");
    let mut ctx = PipelineContext::new(dir.path(), "origin/master");

    let report = pipeline(&world).run(&mut ctx).await.unwrap();

    assert!(report.is_success());
    assert_eq!(world.calls_starting_with("pull"), vec!["pull 0.2.1"]);
    assert!(world.calls_starting_with("push").is_empty());
}

#[tokio::test]
async fn test_feature_branch_runs_checks_but_never_touches_registry() {
    let world = Arc::new(World::default());
    let dir = workspace("0.2.1");
    let mut ctx = PipelineContext::new(dir.path(), "feature/new-rule");

    let report = pipeline(&world).run(&mut ctx).await.unwrap();

    assert_eq!(report.result_of(PhaseKind::Test), Some(StageResult::Success));
    assert_eq!(report.result_of(PhaseKind::Deploy), Some(StageResult::Skipped));
    assert_eq!(world.calls_starting_with("image"), vec!["image ./Jenkinsfile"]);
    assert!(world.calls_starting_with("pull").is_empty());
    assert!(world.calls_starting_with("push").is_empty());
}

#[tokio::test]
async fn test_failing_checks_are_all_reported_and_deploy_is_skipped() {
    let world = Arc::new(World {
        failing_commands: BTreeSet::from([
            "pylint --max-line-length=90 *.py".to_string(),
            "flake8 -v".to_string(),
        ]),
        ..World::default()
    });
    let dir = workspace("0.2.1");
    let mut ctx = PipelineContext::new(dir.path(), "master");

    let failure = pipeline(&world).run(&mut ctx).await.unwrap_err();

    match &failure.error {
        PipelineError::Test { failures } => {
            let names: Vec<_> = failures.iter().map(|f| f.task.as_str()).collect();
            assert_eq!(names, vec!["flake8", "pylint"]);
        }
        other => panic!("expected test failure, got {other:?}"),
    }
    // Every check still ran despite the failures
    assert_eq!(world.calls_starting_with("sh ").len(), 4);
    assert_eq!(world.calls_starting_with("image").len(), 1);
    assert_eq!(
        failure.report.result_of(PhaseKind::Deploy),
        Some(StageResult::Skipped)
    );
    assert!(world.calls_starting_with("pull").is_empty());
}

#[tokio::test]
async fn test_build_failure_stops_the_pipeline() {
    let world = Arc::new(World {
        broken_build: true,
        ..World::default()
    });
    let dir = workspace("0.2.1");
    let mut ctx = PipelineContext::new(dir.path(), "master");
    let metrics = Arc::new(MetricsCollector::new());

    let failure = pipeline(&world)
        .with_orchestrator(Orchestrator::new().with_metrics(Arc::clone(&metrics)))
        .run(&mut ctx)
        .await
        .unwrap_err();

    assert_eq!(failure.error.phase(), Some(PhaseKind::Build));
    assert_eq!(failure.report.result_of(PhaseKind::Build), Some(StageResult::Failure));
    assert_eq!(failure.report.result_of(PhaseKind::Test), Some(StageResult::Skipped));
    assert!(world.calls_starting_with("sh flake8").is_empty());
    assert!(world.calls_starting_with("image").is_empty());
    assert!(ctx.try_artifact().is_none());
    assert_eq!(metrics.for_run(&ctx.run_id).len(), PhaseKind::ALL.len());
}

#[tokio::test]
async fn test_missing_version_file_fails_deploy() {
    let world = Arc::new(World::default());
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = PipelineContext::new(dir.path(), "master");

    let failure = pipeline(&world).run(&mut ctx).await.unwrap_err();

    assert!(matches!(failure.error, PipelineError::DeployVersionRead { .. }));
    assert_eq!(failure.report.result_of(PhaseKind::Test), Some(StageResult::Success));
    assert!(world.calls_starting_with("push").is_empty());
}
