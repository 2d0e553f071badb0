// ABOUTME: Resolved deploy target: one environment's namespace, cluster and manifests.
// ABOUTME: Paths are resolved against the project directory at construction.

use std::path::PathBuf;
use std::time::Duration;

use super::ManifestKind;
use crate::config::{ClusterAuth, Config};
use crate::error::Result;
use crate::types::{EnvironmentName, ResourceName};

#[derive(Debug, Clone)]
pub struct DeployTarget {
    pub environment: EnvironmentName,
    pub namespace: ResourceName,
    /// Deployment object whose rollout is awaited.
    pub deployment: ResourceName,
    pub cluster: ClusterAuth,
    /// Manifest files in apply order.
    pub manifests: Vec<(ManifestKind, PathBuf)>,
    pub url: Option<String>,
    pub rollout_timeout: Duration,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub max_poll_failures: u32,
}

impl DeployTarget {
    pub fn from_config(config: &Config, environment: EnvironmentName) -> Result<Self> {
        let env = config.environment(environment)?;

        Ok(Self {
            environment,
            namespace: env.namespace.clone(),
            deployment: env.deployment.clone().unwrap_or_else(|| config.app.clone()),
            cluster: env.cluster.clone(),
            manifests: env
                .manifests
                .ordered()
                .into_iter()
                .map(|(kind, path)| (kind, config.resolve_path(path)))
                .collect(),
            url: env.url.clone(),
            rollout_timeout: env.rollout_timeout,
            poll_interval: env.poll_interval,
            request_timeout: env.request_timeout,
            max_poll_failures: env.max_poll_failures.max(1),
        })
    }
}
