// ABOUTME: Deployment environment configuration.
// ABOUTME: Namespace, cluster authentication, manifest set, public URL and rollout bounds.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::deploy::ManifestKind;
use crate::types::ResourceName;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
    pub namespace: ResourceName,

    /// Deployment object to watch; defaults to the app name.
    #[serde(default)]
    pub deployment: Option<ResourceName>,

    pub cluster: ClusterAuth,

    pub manifests: ManifestSet,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_rollout_timeout", with = "humantime_serde")]
    pub rollout_timeout: Duration,

    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Per-request timeout passed to kubectl.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Consecutive failed status polls tolerated before giving up.
    #[serde(default = "default_max_poll_failures")]
    pub max_poll_failures: u32,
}

fn default_rollout_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_poll_failures() -> u32 {
    5
}

/// How kubectl reaches the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "ClusterEntry")]
pub enum ClusterAuth {
    /// An existing kubeconfig context, e.g. `group/project:agent`.
    Context(String),
    /// Agent proxy credentials built from the agent id and the CI job token.
    Agent {
        id: u64,
        /// Proxy URL; derived from the CI server URL when absent.
        server: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClusterEntry {
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    agent_id: Option<u64>,
    #[serde(default)]
    server: Option<String>,
}

impl TryFrom<ClusterEntry> for ClusterAuth {
    type Error = String;

    fn try_from(entry: ClusterEntry) -> Result<Self, Self::Error> {
        match (entry.context, entry.agent_id) {
            (Some(context), None) if entry.server.is_none() => Ok(ClusterAuth::Context(context)),
            (Some(_), None) => Err("`server` only applies to `agent_id` clusters".to_string()),
            (None, Some(id)) => Ok(ClusterAuth::Agent {
                id,
                server: entry.server,
            }),
            (Some(_), Some(_)) => Err("cluster takes either `context` or `agent_id`, not both".to_string()),
            (None, None) => Err("cluster requires `context` or `agent_id`".to_string()),
        }
    }
}

/// The three manifests applied on every deploy.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestSet {
    pub deployment: PathBuf,
    pub service: PathBuf,
    pub ingress: PathBuf,
}

impl ManifestSet {
    /// Manifests in apply order.
    pub fn ordered(&self) -> [(ManifestKind, &PathBuf); 3] {
        [
            (ManifestKind::Deployment, &self.deployment),
            (ManifestKind::Service, &self.service),
            (ManifestKind::Ingress, &self.ingress),
        ]
    }
}
