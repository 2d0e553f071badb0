// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Writes kedge.yml and, on request, a Dockerfile and manifest templates.

use std::path::Path;

use crate::deploy::{IMAGE_NAME_PLACEHOLDER, IMAGE_TAG_PLACEHOLDER};
use crate::error::{Error, Result};
use crate::types::ResourceName;

use super::CONFIG_FILENAME;

/// Write `kedge.yml` (and with `scaffold`, the build and manifest templates).
///
/// Returns the paths that were written.
pub fn init_config(
    dir: &Path,
    app: Option<&str>,
    force: bool,
    scaffold: bool,
) -> Result<Vec<std::path::PathBuf>> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let app = ResourceName::new(app.unwrap_or("my-app"))
        .map_err(|e| Error::InvalidConfig(e.to_string()))?;

    let mut files = vec![(config_path, template_yaml(&app))];

    if scaffold {
        files.push((dir.join("Dockerfile"), DOCKERFILE_TEMPLATE.to_string()));
        files.push((dir.join("k8s/deployment.yaml"), deployment_manifest(&app)));
        files.push((dir.join("k8s/service.yaml"), service_manifest(&app)));
        files.push((dir.join("k8s/ingress.yaml"), ingress_manifest(&app)));
    }

    let mut written = Vec::new();
    for (path, content) in files {
        if path.exists() && !force {
            tracing::warn!("Keeping existing {}", path.display());
            continue;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        written.push(path);
    }

    Ok(written)
}

/// The default five-stage pipeline for `app`.
pub fn template_yaml(app: &ResourceName) -> String {
    format!(
        r#"app: {app}
default_branch: main

image:
  dockerfile: Dockerfile
  context: .
  builder: docker
  push_retry:
    attempts: 3
    initial_delay: 2s
    max_delay: 30s

stages: [lint, test, build, deploy-dev, deploy-prod]

jobs:
  - name: lint
    stage: lint
    rules:
      - default_branch: true
      - branch: development
      - branch: production
      - event: merge_request_event
    script:
      - npm ci
      - npm run lint
    allow_failure: true

  - name: test
    stage: test
    rules:
      - default_branch: true
      - branch: development
      - branch: production
      - event: merge_request_event
    script:
      - npm ci
      - npm test

  - name: build
    stage: build
    rules:
      - default_branch: true
      - branch: development
      - branch: production
      - event: merge_request_event
    publish: true

  - name: deploy-dev
    stage: deploy-dev
    rules:
      - branch: development
    deploy: development

  - name: deploy-prod
    stage: deploy-prod
    rules:
      - default_branch: true
      - branch: production
    deploy: production
    when: manual

environments:
  development:
    namespace: {app}-dev
    cluster:
      agent_id: 1
    manifests:
      deployment: k8s/deployment.yaml
      service: k8s/service.yaml
      ingress: k8s/ingress.yaml
    url: https://dev.{app}.example.com

  production:
    namespace: {app}-prod
    cluster:
      agent_id: 1
    manifests:
      deployment: k8s/deployment.yaml
      service: k8s/service.yaml
      ingress: k8s/ingress.yaml
    url: https://{app}.example.com
    rollout_timeout: 5m
"#
    )
}

const DOCKERFILE_TEMPLATE: &str = r#"FROM node:20-alpine

WORKDIR /app

COPY package*.json ./
RUN npm ci --omit=dev

COPY . .

EXPOSE 3000

CMD ["npm", "start"]
"#;

fn deployment_manifest(app: &ResourceName) -> String {
    format!(
        r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: {app}
  labels:
    app: {app}
spec:
  replicas: 2
  selector:
    matchLabels:
      app: {app}
  template:
    metadata:
      labels:
        app: {app}
    spec:
      containers:
        - name: {app}
          image: {IMAGE_NAME_PLACEHOLDER}:{IMAGE_TAG_PLACEHOLDER}
          ports:
            - containerPort: 3000
"#
    )
}

fn service_manifest(app: &ResourceName) -> String {
    format!(
        r#"apiVersion: v1
kind: Service
metadata:
  name: {app}
spec:
  selector:
    app: {app}
  ports:
    - port: 80
      targetPort: 3000
"#
    )
}

fn ingress_manifest(app: &ResourceName) -> String {
    format!(
        r#"apiVersion: networking.k8s.io/v1
kind: Ingress
metadata:
  name: {app}
spec:
  rules:
    - host: {app}.example.com
      http:
        paths:
          - path: /
            pathType: Prefix
            backend:
              service:
                name: {app}
                port:
                  number: 80
"#
    )
}
