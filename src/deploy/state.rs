// ABOUTME: Deployment state types for the type state pattern.
// ABOUTME: States after authentication carry the kubectl handle they were reached with.

use std::time::Duration;
use tokio::time::Instant;

use super::{Approval, Kubectl, ManifestKind};

/// Initial state: manifests rendered, approval checked.
/// Available actions: `authenticate()`
#[derive(Debug, Clone)]
pub struct Initialized {
    pub(crate) approval: Option<Approval>,
}

/// Cluster credentials verified.
/// Available actions: `ensure_namespace()`
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub(crate) kubectl: Kubectl,
}

/// Target namespace exists.
/// Available actions: `apply_manifests()`
#[derive(Debug, Clone)]
pub struct NamespaceEnsured {
    pub(crate) kubectl: Kubectl,
}

/// Deployment, service and ingress applied.
/// Available actions: `start_rollout()`
#[derive(Debug, Clone)]
pub struct ManifestsApplied {
    pub(crate) kubectl: Kubectl,
    pub(crate) applied: Vec<ManifestKind>,
}

/// Waiting for the new pods to become ready.
/// Available actions: `await_rollout()`
#[derive(Debug, Clone)]
pub struct RolloutInProgress {
    pub(crate) kubectl: Kubectl,
    pub(crate) started: Instant,
}

/// Rollout finished; all replicas updated and available.
/// Available actions: `finish()`
#[derive(Debug, Clone)]
pub struct RolloutComplete {
    pub(crate) elapsed: Duration,
}

/// Rollout failed or timed out. Terminal; nothing is rolled back.
#[derive(Debug, Clone)]
pub struct RolloutFailed {
    pub(crate) elapsed: Duration,
}
