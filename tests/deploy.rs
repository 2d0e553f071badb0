// ABOUTME: Integration tests for the cluster deployer.
// ABOUTME: Drives run_deployment against a recording runner and inspects the kubectl calls.

mod support;

use std::time::{Duration, Instant};

use kedge::deploy::{Approval, DeployOptions, run_deployment};
use kedge::diagnostics::{Diagnostics, WarningKind};
use kedge::error::ErrorKind;
use kedge::process::{CommandOutput, RecordingRunner};
use kedge::types::EnvironmentName;
use support::{DEPLOY_CONFIG, REGISTRY_IMAGE, SHORT_SHA, create_hook, ctx, project};

const WAITING: &str =
    "Waiting for deployment \"shop\" rollout to finish: 1 of 2 updated replicas are available...\n";

fn rolled_out() -> RecordingRunner {
    let runner = RecordingRunner::new();
    runner.respond(
        "rollout status",
        CommandOutput::success("deployment \"shop\" successfully rolled out\n"),
    );
    runner
}

fn applied_manifests(runner: &RecordingRunner) -> Vec<String> {
    runner
        .commands()
        .iter()
        .filter(|c| c.to_string().contains("apply -f -"))
        .map(|c| c.stdin_data().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn production_deploy_substitutes_image_and_applies_three_kinds_in_order() {
    let (_dir, config) = project(DEPLOY_CONFIG);
    let runner = rolled_out();
    let mut diagnostics = Diagnostics::default();

    let outcome = run_deployment(
        &runner,
        &config,
        EnvironmentName::Production,
        &ctx("main"),
        Some(Approval::granted("deploy-prod")),
        DeployOptions::default(),
        &mut diagnostics,
    )
    .await
    .unwrap();

    let expected_image = format!("{}:{}", REGISTRY_IMAGE, SHORT_SHA);
    assert_eq!(outcome.image, expected_image);
    assert_eq!(outcome.namespace, "shop-prod");

    let manifests = applied_manifests(&runner);
    assert_eq!(manifests.len(), 3);
    assert!(manifests[0].contains("kind: Deployment"));
    assert!(manifests[1].contains("kind: Service"));
    assert!(manifests[2].contains("kind: Ingress"));

    assert!(manifests[0].contains(&format!("image: {}", expected_image)));
    for manifest in &manifests {
        assert!(!manifest.contains("_PLACEHOLDER__"));
    }
    assert!(!diagnostics.has_warnings());
}

#[tokio::test]
async fn cluster_calls_follow_the_deploy_order() {
    let (_dir, config) = project(DEPLOY_CONFIG);
    let runner = rolled_out();

    run_deployment(
        &runner,
        &config,
        EnvironmentName::Development,
        &ctx("development"),
        None,
        DeployOptions::default(),
        &mut Diagnostics::default(),
    )
    .await
    .unwrap();

    let lines = runner.lines();
    let position = |needle: &str| {
        lines
            .iter()
            .position(|l| l.contains(needle))
            .unwrap_or_else(|| panic!("no command containing {needle:?} in {lines:#?}"))
    };

    assert!(position("auth can-i") < position("create namespace shop-dev"));
    assert!(position("create namespace") < position("create configmap kedge-deploy-lock"));
    assert!(position("create configmap") < position("apply -f -"));
    assert!(position("apply -f -") < position("rollout status deployment/shop"));
    assert!(position("rollout status") < position("delete configmap kedge-deploy-lock"));
    assert!(lines.iter().all(|l| l.contains("--context group/app:agent")));
}

#[tokio::test]
async fn existing_namespace_is_not_an_error() {
    let (_dir, config) = project(DEPLOY_CONFIG);
    let runner = rolled_out();
    runner.respond(
        "create namespace",
        CommandOutput::failure(
            1,
            "Error from server (AlreadyExists): namespaces \"shop-dev\" already exists",
        ),
    );

    for _ in 0..2 {
        run_deployment(
            &runner,
            &config,
            EnvironmentName::Development,
            &ctx("development"),
            None,
            DeployOptions::default(),
            &mut Diagnostics::default(),
        )
        .await
        .unwrap();
    }

    assert_eq!(runner.lines_matching("create namespace").len(), 2);
}

#[tokio::test]
async fn forbidden_namespace_fails_with_apply_error() {
    let (_dir, config) = project(DEPLOY_CONFIG);
    let runner = rolled_out();
    runner.respond(
        "create namespace",
        CommandOutput::failure(1, "Error from server (Forbidden): namespaces is forbidden"),
    );

    let err = run_deployment(
        &runner,
        &config,
        EnvironmentName::Development,
        &ctx("development"),
        None,
        DeployOptions::default(),
        &mut Diagnostics::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Apply);
    assert!(runner.lines_matching("apply -f -").is_empty());
}

#[tokio::test]
async fn production_without_approval_touches_nothing() {
    let (_dir, config) = project(DEPLOY_CONFIG);
    let runner = rolled_out();

    let err = run_deployment(
        &runner,
        &config,
        EnvironmentName::Production,
        &ctx("main"),
        None,
        DeployOptions::default(),
        &mut Diagnostics::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ApprovalRequired);
    assert!(runner.lines().is_empty());
}

#[tokio::test]
async fn rollout_wait_is_bounded_by_the_timeout() {
    let (_dir, config) = project(DEPLOY_CONFIG);
    let runner = RecordingRunner::new();
    runner.respond("rollout status", CommandOutput::success(WAITING));

    let started = Instant::now();
    let err = run_deployment(
        &runner,
        &config,
        EnvironmentName::Development,
        &ctx("development"),
        None,
        DeployOptions::default(),
        &mut Diagnostics::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RolloutTimeout);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(runner.lines_matching("rollout status").len() > 1);
    // Lock is released even though the rollout failed
    assert_eq!(runner.lines_matching("delete configmap").len(), 1);
}

#[tokio::test]
async fn unreachable_cluster_fails_before_the_deadline() {
    let yaml = DEPLOY_CONFIG.replacen(
        "rollout_timeout: 300ms",
        "rollout_timeout: 10s\n    max_poll_failures: 3",
        1,
    );
    let (_dir, config) = project(&yaml);
    let runner = RecordingRunner::new();
    runner.time_out("rollout status");

    let started = Instant::now();
    let err = run_deployment(
        &runner,
        &config,
        EnvironmentName::Development,
        &ctx("development"),
        None,
        DeployOptions::default(),
        &mut Diagnostics::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RolloutFailed);
    assert!(err.to_string().contains("cluster unreachable"), "{err}");
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(runner.lines_matching("rollout status").len(), 3);
    assert_eq!(runner.lines_matching("delete configmap").len(), 1);
}

#[tokio::test]
async fn intermittent_poll_failures_reset_while_progressing() {
    let runner = RecordingRunner::new();
    for _ in 0..4 {
        runner.respond_once("rollout status", CommandOutput::failure(1, "connection refused"));
        runner.respond_once("rollout status", CommandOutput::success(WAITING));
    }
    runner.respond("rollout status", CommandOutput::success(WAITING));
    let yaml = DEPLOY_CONFIG.replacen(
        "rollout_timeout: 300ms",
        "rollout_timeout: 300ms\n    max_poll_failures: 2",
        1,
    );
    let (_dir, config) = project(&yaml);

    let err = run_deployment(
        &runner,
        &config,
        EnvironmentName::Development,
        &ctx("development"),
        None,
        DeployOptions::default(),
        &mut Diagnostics::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RolloutTimeout);
}

#[tokio::test]
async fn rejected_deployment_manifest_stops_before_service_and_rollout() {
    let (_dir, config) = project(DEPLOY_CONFIG);
    let runner = rolled_out();
    runner.respond(
        "apply -f -",
        CommandOutput::failure(1, "error: error validating data: unknown field \"replica\""),
    );

    let err = run_deployment(
        &runner,
        &config,
        EnvironmentName::Development,
        &ctx("development"),
        None,
        DeployOptions::default(),
        &mut Diagnostics::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Apply);
    let manifests = applied_manifests(&runner);
    assert_eq!(manifests.len(), 1);
    assert!(manifests[0].contains("kind: Deployment"));
    assert!(runner.lines_matching("rollout status").is_empty());
    assert_eq!(runner.lines_matching("delete configmap kedge-deploy-lock").len(), 1);
}

#[tokio::test]
async fn denied_cluster_access_fails_with_auth_error() {
    let (_dir, config) = project(DEPLOY_CONFIG);
    let runner = rolled_out();
    runner.respond("auth can-i", CommandOutput::failure(1, "no"));

    let err = run_deployment(
        &runner,
        &config,
        EnvironmentName::Development,
        &ctx("development"),
        None,
        DeployOptions::default(),
        &mut Diagnostics::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Auth);
    assert!(err.to_string().contains("access denied"), "{err}");
    assert!(runner.lines_matching("create namespace").is_empty());
    assert!(runner.lines_matching("apply -f -").is_empty());
}

#[tokio::test]
async fn progress_deadline_fails_rollout_and_runs_on_error_hook() {
    let (dir, config) = project(DEPLOY_CONFIG);
    create_hook(dir.path(), "on-error", "#!/bin/sh\nexit 0\n");
    let runner = RecordingRunner::new();
    runner.respond(
        "rollout status",
        CommandOutput::failure(1, "error: deployment \"shop\" exceeded its progress deadline"),
    );

    let err = run_deployment(
        &runner,
        &config,
        EnvironmentName::Development,
        &ctx("development"),
        None,
        DeployOptions::default(),
        &mut Diagnostics::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RolloutFailed);
    assert_eq!(runner.lines_matching("rollout status").len(), 1);
    assert_eq!(runner.lines_matching("hooks/on-error").len(), 1);
    assert!(runner.lines_matching("rollout undo").is_empty());
}

#[tokio::test]
async fn missing_placeholder_is_a_config_error_before_any_cluster_call() {
    let (dir, config) = project(DEPLOY_CONFIG);
    support::write_manifests(dir.path(), "kind: Deployment\nimage: nginx:latest\n");
    let runner = rolled_out();

    let err = run_deployment(
        &runner,
        &config,
        EnvironmentName::Development,
        &ctx("development"),
        None,
        DeployOptions::default(),
        &mut Diagnostics::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(runner.lines().is_empty());
}

#[tokio::test]
async fn failing_pre_deploy_hook_aborts_before_the_cluster() {
    let (dir, config) = project(DEPLOY_CONFIG);
    create_hook(dir.path(), "pre-deploy", "#!/bin/sh\nexit 1\n");
    let runner = rolled_out();
    runner.respond("hooks/pre-deploy", CommandOutput::failure(1, "migrations pending"));

    let err = run_deployment(
        &runner,
        &config,
        EnvironmentName::Development,
        &ctx("development"),
        None,
        DeployOptions::default(),
        &mut Diagnostics::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Hook);
    assert!(runner.lines_matching("kubectl").is_empty());
}

#[tokio::test]
async fn failing_post_deploy_hook_only_warns() {
    let (dir, config) = project(DEPLOY_CONFIG);
    create_hook(dir.path(), "post-deploy", "#!/bin/sh\nexit 1\n");
    let runner = rolled_out();
    runner.respond("hooks/post-deploy", CommandOutput::failure(2, "slack down"));
    let mut diagnostics = Diagnostics::default();

    run_deployment(
        &runner,
        &config,
        EnvironmentName::Development,
        &ctx("development"),
        None,
        DeployOptions::default(),
        &mut diagnostics,
    )
    .await
    .unwrap();

    assert_eq!(diagnostics.warnings().len(), 1);
    assert_eq!(diagnostics.warnings()[0].kind, WarningKind::HookFailed);
}

#[tokio::test]
async fn hooks_receive_deploy_context() {
    let (dir, config) = project(DEPLOY_CONFIG);
    create_hook(dir.path(), "pre-deploy", "#!/bin/sh\nexit 0\n");
    let runner = rolled_out();

    run_deployment(
        &runner,
        &config,
        EnvironmentName::Development,
        &ctx("development"),
        None,
        DeployOptions::default(),
        &mut Diagnostics::default(),
    )
    .await
    .unwrap();

    let hook = runner
        .commands()
        .into_iter()
        .find(|c| c.to_string().contains("hooks/pre-deploy"))
        .unwrap();
    let env = hook.env_vars();
    assert_eq!(env.get("KEDGE_APP").map(String::as_str), Some("shop"));
    assert_eq!(
        env.get("KEDGE_ENVIRONMENT").map(String::as_str),
        Some("development")
    );
    assert_eq!(
        env.get("KEDGE_IMAGE").cloned(),
        Some(format!("{}:{}", REGISTRY_IMAGE, SHORT_SHA))
    );
}

#[tokio::test]
async fn held_lock_refuses_deploy_without_applying() {
    let (_dir, config) = project(DEPLOY_CONFIG);
    let runner = rolled_out();
    runner.respond(
        "create configmap",
        CommandOutput::failure(1, "Error from server (AlreadyExists)"),
    );
    runner.respond(
        "get configmap",
        CommandOutput::success(format!(
            r#"{{"data":{{"holder":"runner-2","pid":"77","started_at":"{}","commit":"feedface"}}}}"#,
            chrono::Utc::now().to_rfc3339()
        )),
    );

    let err = run_deployment(
        &runner,
        &config,
        EnvironmentName::Development,
        &ctx("development"),
        None,
        DeployOptions::default(),
        &mut Diagnostics::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::LockHeld);
    assert!(runner.lines_matching("apply -f -").is_empty());
}

#[tokio::test]
async fn agent_credentials_never_show_the_job_token() {
    let yaml = DEPLOY_CONFIG.replace("context: group/app:agent", "agent_id: 42");
    let (_dir, config) = project(&yaml);
    let runner = rolled_out();

    run_deployment(
        &runner,
        &config,
        EnvironmentName::Development,
        &ctx("development"),
        None,
        DeployOptions::default(),
        &mut Diagnostics::default(),
    )
    .await
    .unwrap();

    let lines = runner.lines();
    assert!(lines.iter().all(|l| !l.contains("job-token-123")));
    assert!(lines[0].contains(
        "set-cluster kedge-agent-42 --server=https://gitlab.example.com/-/kubernetes-agent/k8s-proxy/"
    ));
    assert!(lines.iter().any(|l| l.contains("--context kedge-agent-42")));
}
