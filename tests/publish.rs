// ABOUTME: Integration tests for the image publisher.
// ABOUTME: Checks tag sets, push retries and settings resolved from config.

mod support;

use std::time::Duration;

use kedge::config::Config;
use kedge::context::PipelineContext;
use kedge::error::{Error, ErrorKind};
use kedge::process::{CommandOutput, RecordingRunner};
use kedge::publish::{Builder, ImagePublisher, PublishError, PublishSettings, RetryPolicy, commit_image};
use proptest::prelude::*;
use support::{REGISTRY_IMAGE, SHA, SHORT_SHA, ctx};

const CONFIG: &str = r#"
app: shop
image:
  builder: podman
  dockerfile: docker/Dockerfile
  context: app
  build_args:
    NODE_VERSION: "20"
  push_retry:
    attempts: 2
    initial_delay: 1ms
    max_delay: 2ms
stages: [build]
jobs:
  - name: build
    stage: build
    publish: true
"#;

fn settings(config: &Config, ctx: &PipelineContext) -> PublishSettings {
    PublishSettings::from_config(config, ctx).unwrap()
}

#[test]
fn settings_come_from_config_with_ci_registry_fallback() {
    let config = Config::from_yaml(CONFIG).unwrap();
    let settings = settings(&config, &ctx("main"));

    assert_eq!(settings.builder, Builder::Podman);
    assert_eq!(settings.repository.to_string(), REGISTRY_IMAGE);
    assert!(settings.dockerfile.ends_with("docker/Dockerfile"));
    assert_eq!(settings.build_args.get("NODE_VERSION").map(String::as_str), Some("20"));
    assert_eq!(settings.retry.attempts(), 2);
}

#[test]
fn missing_repository_is_a_config_error() {
    let config = Config::from_yaml(CONFIG).unwrap();
    let ctx = PipelineContext::builder(SHA, "main").build().unwrap();

    let err = PublishSettings::from_config(&config, &ctx).unwrap_err();
    assert!(matches!(err, Error::Publish(PublishError::MissingRepository)));
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn commit_image_carries_the_short_sha() {
    let config = Config::from_yaml(CONFIG).unwrap();
    let image = commit_image(&config, &ctx("feature/x")).unwrap();
    assert_eq!(image.to_string(), format!("{}:{}", REGISTRY_IMAGE, SHORT_SHA));
}

#[tokio::test]
async fn default_branch_pushes_commit_slug_and_latest() {
    let config = Config::from_yaml(CONFIG).unwrap();
    let runner = RecordingRunner::new();
    let ctx = ctx("main");

    let image = ImagePublisher::new(&runner, settings(&config, &ctx))
        .publish(&ctx)
        .await
        .unwrap();

    let pushes = runner.lines_matching("podman push");
    assert_eq!(
        pushes,
        [
            format!("podman push {}:{}", REGISTRY_IMAGE, SHORT_SHA),
            format!("podman push {}:main", REGISTRY_IMAGE),
            format!("podman push {}:latest", REGISTRY_IMAGE),
        ]
    );
    assert_eq!(image.commit_reference().tag(), Some(SHORT_SHA));
}

#[tokio::test]
async fn exhausted_push_retries_fail_with_push_error() {
    let config = Config::from_yaml(CONFIG).unwrap();
    let runner = RecordingRunner::new();
    runner.respond("podman push", CommandOutput::failure(1, "denied: quota exceeded"));
    let ctx = ctx("development");

    let err = ImagePublisher::new(&runner, settings(&config, &ctx))
        .publish(&ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::Push { attempts: 2, .. }));
    assert_eq!(err.kind(), ErrorKind::Push);
    assert_eq!(runner.lines_matching("podman push").len(), 2);
}

#[tokio::test]
async fn failed_build_pushes_nothing() {
    let config = Config::from_yaml(CONFIG).unwrap();
    let runner = RecordingRunner::new();
    runner.respond("podman build", CommandOutput::failure(1, "COPY failed"));
    let ctx = ctx("development");

    let err = ImagePublisher::new(&runner, settings(&config, &ctx))
        .publish(&ctx)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Build);
    assert!(runner.lines_matching("podman push").is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_publish_pushes_the_commit_tag(branch in "[A-Za-z0-9][A-Za-z0-9/_.-]{0,40}") {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let ctx = PipelineContext::builder(SHA, branch).build().unwrap();
        let settings = PublishSettings {
            builder: Builder::Docker,
            repository: kedge::types::ImageRef::parse(REGISTRY_IMAGE).unwrap(),
            dockerfile: "Dockerfile".into(),
            context: ".".into(),
            build_args: Default::default(),
            build_timeout: Duration::from_secs(60),
            retry: RetryPolicy::none(),
        };
        let runner = RecordingRunner::new();

        let image = rt
            .block_on(ImagePublisher::new(&runner, settings).publish(&ctx))
            .unwrap();

        prop_assert_eq!(image.tags.commit().as_str(), SHORT_SHA);
        let commit_push = format!("docker push {}:{}", REGISTRY_IMAGE, SHORT_SHA);
        let pushes = runner.lines_matching("docker push");
        prop_assert_eq!(pushes[0].as_str(), commit_push.as_str());
    }
}
