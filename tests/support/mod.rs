// ABOUTME: Shared fixtures for integration tests.
// ABOUTME: Builds throwaway projects with kedge.yml, manifests and hooks in a temp dir.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::TempDir;

use kedge::config::{Config, init_config};
use kedge::context::PipelineContext;
use kedge::types::Secret;

pub const SHA: &str = "abc123def4567890abc123def4567890abc123de";
pub const SHORT_SHA: &str = "abc123de";
pub const REGISTRY_IMAGE: &str = "registry.example.com/group/app";

/// Single-environment project deploying through a fixed kube context.
pub const DEPLOY_CONFIG: &str = r#"
app: shop
image:
  repository: registry.example.com/group/app
stages: [deploy-dev, deploy-prod]
jobs:
  - name: deploy-dev
    stage: deploy-dev
    deploy: development
  - name: deploy-prod
    stage: deploy-prod
    deploy: production
    when: manual
environments:
  development:
    namespace: shop-dev
    cluster:
      context: group/app:agent
    manifests:
      deployment: k8s/deployment.yaml
      service: k8s/service.yaml
      ingress: k8s/ingress.yaml
    url: https://dev.shop.example.com
    rollout_timeout: 300ms
    poll_interval: 20ms
  production:
    namespace: shop-prod
    cluster:
      context: group/app:agent
    manifests:
      deployment: k8s/deployment.yaml
      service: k8s/service.yaml
      ingress: k8s/ingress.yaml
    url: https://shop.example.com
    rollout_timeout: 300ms
    poll_interval: 20ms
"#;

pub const DEPLOYMENT: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: shop
spec:
  template:
    spec:
      containers:
        - name: shop
          image: __IMAGE_NAME_PLACEHOLDER__:__IMAGE_TAG_PLACEHOLDER__
"#;

pub const SERVICE: &str = "apiVersion: v1\nkind: Service\nmetadata:\n  name: shop\n";

pub const INGRESS: &str =
    "apiVersion: networking.k8s.io/v1\nkind: Ingress\nmetadata:\n  name: shop\n";

/// A project with `yaml` as kedge.yml and the three standard manifests.
pub fn project(yaml: &str) -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("kedge.yml"), yaml).unwrap();
    write_manifests(dir.path(), DEPLOYMENT);
    let config = Config::discover(dir.path()).unwrap();
    (dir, config)
}

/// A project generated by `kedge init --scaffold`.
pub fn scaffolded(app: &str) -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    init_config(dir.path(), Some(app), false, true).unwrap();
    let config = Config::discover(dir.path()).unwrap();
    (dir, config)
}

pub fn write_manifests(dir: &Path, deployment: &str) {
    let k8s = dir.join("k8s");
    fs::create_dir_all(&k8s).unwrap();
    fs::write(k8s.join("deployment.yaml"), deployment).unwrap();
    fs::write(k8s.join("service.yaml"), SERVICE).unwrap();
    fs::write(k8s.join("ingress.yaml"), INGRESS).unwrap();
}

pub fn create_hook(dir: &Path, name: &str, script: &str) {
    let hooks_dir = dir.join(".kedge").join("hooks");
    fs::create_dir_all(&hooks_dir).unwrap();

    let hook_path = hooks_dir.join(name);
    fs::write(&hook_path, script).unwrap();

    let mut perms = fs::metadata(&hook_path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&hook_path, perms).unwrap();
}

/// Push pipeline on `branch` with agent credentials available.
pub fn ctx(branch: &str) -> PipelineContext {
    PipelineContext::builder(SHA, branch)
        .default_branch("main")
        .registry_image(REGISTRY_IMAGE)
        .server_url("https://gitlab.example.com")
        .job_token(Secret::new("job-token-123"))
        .build()
        .unwrap()
}
