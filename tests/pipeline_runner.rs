// ABOUTME: Integration tests for running the default five-stage pipeline.
// ABOUTME: Uses the scaffolded project and a recording runner in place of real tools.

mod support;

use kedge::deploy::DeployOptions;
use kedge::diagnostics::{Diagnostics, WarningKind};
use kedge::pipeline::{Approvals, JobOutcome, PipelineExecutor, PipelineStatus, StageRunner};
use kedge::process::{CommandOutput, RecordingRunner};
use support::{SHORT_SHA, ctx, scaffolded};

fn rolled_out() -> RecordingRunner {
    let runner = RecordingRunner::new();
    runner.respond(
        "rollout status",
        CommandOutput::success("deployment \"shop\" successfully rolled out\n"),
    );
    runner
}

fn outcome<'a>(report: &'a kedge::pipeline::PipelineReport, job: &str) -> &'a JobOutcome {
    &report.job(job).unwrap_or_else(|| panic!("{job} not in report")).outcome
}

#[tokio::test]
async fn development_branch_runs_every_stage_through_deploy_dev() {
    let (_dir, config) = scaffolded("shop");
    let runner = rolled_out();
    let executor = PipelineExecutor::new(&runner, &config, DeployOptions::default());
    let approvals = Approvals::none();
    let ctx = ctx("development");
    let pipeline = config.pipeline().unwrap();
    let mut diagnostics = Diagnostics::default();

    let report = StageRunner::new(&executor, &approvals)
        .run(&pipeline.plan(&ctx), &ctx, &mut diagnostics)
        .await;

    assert_eq!(report.status, PipelineStatus::Success);
    let names: Vec<&str> = report.jobs().map(|j| j.name.as_str()).collect();
    assert_eq!(names, ["lint", "test", "build", "deploy-dev"]);

    let lines = runner.lines();
    let last_lint = lines.iter().rposition(|l| l.contains("npm run lint")).unwrap();
    let first_test = lines.iter().position(|l| l.contains("npm test")).unwrap();
    let build = lines.iter().position(|l| l.starts_with("docker build")).unwrap();
    let apply = lines.iter().position(|l| l.contains("apply -f -")).unwrap();
    assert!(last_lint < first_test);
    assert!(first_test < build);
    assert!(build < apply);
    assert!(!runner.lines_matching(&format!("push registry.example.com/group/app:{}", SHORT_SHA)).is_empty());
    assert!(runner.lines_matching("namespace shop-prod").is_empty());
}

#[tokio::test]
async fn lint_failure_is_reported_but_does_not_halt() {
    let (_dir, config) = scaffolded("shop");
    let runner = rolled_out();
    runner.respond("npm run lint", CommandOutput::failure(1, "3 problems"));
    let executor = PipelineExecutor::new(&runner, &config, DeployOptions::default());
    let approvals = Approvals::none();
    let ctx = ctx("development");
    let pipeline = config.pipeline().unwrap();
    let mut diagnostics = Diagnostics::default();

    let report = StageRunner::new(&executor, &approvals)
        .run(&pipeline.plan(&ctx), &ctx, &mut diagnostics)
        .await;

    assert!(report.succeeded());
    assert!(matches!(outcome(&report, "lint"), JobOutcome::AllowedFailure { .. }));
    assert_eq!(outcome(&report, "deploy-dev"), &JobOutcome::Success);
    assert_eq!(diagnostics.warnings()[0].kind, WarningKind::AllowedFailure);
}

#[tokio::test]
async fn test_failure_skips_build_and_deploy() {
    let (_dir, config) = scaffolded("shop");
    let runner = rolled_out();
    runner.respond("npm test", CommandOutput::failure(1, "1 failing"));
    let executor = PipelineExecutor::new(&runner, &config, DeployOptions::default());
    let approvals = Approvals::none();
    let ctx = ctx("development");
    let pipeline = config.pipeline().unwrap();

    let report = StageRunner::new(&executor, &approvals)
        .run(&pipeline.plan(&ctx), &ctx, &mut Diagnostics::default())
        .await;

    assert_eq!(report.status, PipelineStatus::Failed);
    assert!(matches!(outcome(&report, "test"), JobOutcome::Failed { .. }));
    assert_eq!(outcome(&report, "build"), &JobOutcome::Skipped);
    assert_eq!(outcome(&report, "deploy-dev"), &JobOutcome::Skipped);
    assert_eq!(report.failed_jobs(), ["test"]);
    assert!(runner.lines_matching("docker").is_empty());
    assert!(runner.lines_matching("kubectl").is_empty());
}

#[tokio::test]
async fn production_deploy_waits_for_approval_on_default_branch() {
    let (_dir, config) = scaffolded("shop");
    let runner = rolled_out();
    let executor = PipelineExecutor::new(&runner, &config, DeployOptions::default());
    let approvals = Approvals::none();
    let ctx = ctx("main");
    let pipeline = config.pipeline().unwrap();

    let report = StageRunner::new(&executor, &approvals)
        .run(&pipeline.plan(&ctx), &ctx, &mut Diagnostics::default())
        .await;

    assert!(report.succeeded());
    assert_eq!(outcome(&report, "deploy-prod"), &JobOutcome::Manual);
    assert!(report.job("deploy-dev").is_none());
    assert!(runner.lines_matching("kubectl").is_empty());
    assert!(!runner.lines_matching("app:latest").is_empty());
}

#[tokio::test]
async fn approved_production_deploy_runs() {
    let (_dir, config) = scaffolded("shop");
    let runner = rolled_out();
    let executor = PipelineExecutor::new(&runner, &config, DeployOptions::default());
    let approvals = Approvals::for_jobs(["deploy-prod"]);
    let ctx = ctx("main");
    let pipeline = config.pipeline().unwrap();

    let report = StageRunner::new(&executor, &approvals)
        .run(&pipeline.plan(&ctx), &ctx, &mut Diagnostics::default())
        .await;

    assert!(report.succeeded());
    assert_eq!(outcome(&report, "deploy-prod"), &JobOutcome::Success);
    assert!(!runner.lines_matching("create namespace shop-prod").is_empty());
}

#[tokio::test]
async fn run_job_refuses_jobs_gated_out_for_the_branch() {
    let (_dir, config) = scaffolded("shop");
    let runner = rolled_out();
    let executor = PipelineExecutor::new(&runner, &config, DeployOptions::default());
    let approvals = Approvals::none();
    let pipeline = config.pipeline().unwrap();

    let err = StageRunner::new(&executor, &approvals)
        .run_job(&pipeline, "deploy-dev", &ctx("feature/login"), &mut Diagnostics::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), kedge::error::ErrorKind::Config);
    assert!(runner.lines().is_empty());
}

#[tokio::test]
async fn deploy_warnings_reach_the_executor_diagnostics() {
    let (dir, config) = scaffolded("shop");
    support::create_hook(dir.path(), "post-deploy", "#!/bin/sh\nexit 1\n");
    let runner = rolled_out();
    runner.respond("hooks/post-deploy", CommandOutput::failure(1, "webhook failed"));
    let executor = PipelineExecutor::new(&runner, &config, DeployOptions::default());
    let approvals = Approvals::none();
    let pipeline = config.pipeline().unwrap();

    StageRunner::new(&executor, &approvals)
        .run_job(&pipeline, "deploy-dev", &ctx("development"), &mut Diagnostics::default())
        .await
        .unwrap();

    let diagnostics = executor.take_diagnostics();
    assert_eq!(diagnostics.warnings()[0].kind, WarningKind::HookFailed);
}
