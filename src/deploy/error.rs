// ABOUTME: Error types for cluster deployment operations.
// ABOUTME: Covers approval, cluster auth, manifest rendering, apply, rollout and lock failures.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

use super::ManifestKind;
use crate::error::ErrorKind;
use crate::process::ProcessError;
use crate::types::EnvironmentName;

/// Errors that can occur during deployment state transitions.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("deploying to {environment} requires manual approval")]
    ApprovalRequired { environment: EnvironmentName },

    #[error("image {0} has no tag to deploy")]
    UntaggedImage(String),

    #[error("agent authentication needs CI_JOB_TOKEN")]
    MissingJobToken,

    #[error("agent {0} has no server and CI_SERVER_URL is not set")]
    MissingAgentServer(u64),

    /// Cluster rejected the credentials or denied access.
    #[error("cluster authentication via context {context} failed: {reason}")]
    Auth { context: String, reason: String },

    #[error("failed to read manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{kind} manifest {path} is missing {placeholder}")]
    MissingPlaceholder {
        kind: ManifestKind,
        path: PathBuf,
        placeholder: &'static str,
    },

    #[error("{kind} manifest {path} still contains {token} after substitution")]
    UnresolvedPlaceholder {
        kind: ManifestKind,
        path: PathBuf,
        token: String,
    },

    /// Cluster rejected a namespace or manifest.
    #[error("failed to apply {object}: {reason}")]
    Apply { object: String, reason: String },

    #[error("rollout of {deployment} failed: {reason}")]
    RolloutFailed { deployment: String, reason: String },

    #[error("rollout of {deployment} did not finish within {timeout:?}")]
    RolloutTimeout {
        deployment: String,
        timeout: Duration,
    },

    #[error("rollback of {deployment} failed: {reason}")]
    Rollback { deployment: String, reason: String },

    /// Deploy lock is held by another process.
    #[error(
        "environment locked by {holder} (pid {pid}, commit {commit}) since {started_at}; \
         use --force to break the lock"
    )]
    LockHeld {
        holder: String,
        pid: u32,
        commit: String,
        started_at: DateTime<Utc>,
    },

    /// Deploy lock operation failed.
    #[error("deploy lock error: {0}")]
    Lock(String),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl DeployError {
    pub fn lock_error(message: impl Into<String>) -> Self {
        DeployError::Lock(message.into())
    }

    pub fn apply(object: impl Into<String>, reason: impl Into<String>) -> Self {
        DeployError::Apply {
            object: object.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DeployError::ApprovalRequired { .. } => ErrorKind::ApprovalRequired,
            DeployError::UntaggedImage(_)
            | DeployError::MissingAgentServer(_)
            | DeployError::ManifestRead { .. }
            | DeployError::MissingPlaceholder { .. }
            | DeployError::UnresolvedPlaceholder { .. } => ErrorKind::Config,
            DeployError::MissingJobToken | DeployError::Auth { .. } => ErrorKind::Auth,
            DeployError::Apply { .. } | DeployError::Rollback { .. } | DeployError::Lock(_) => {
                ErrorKind::Apply
            }
            DeployError::RolloutFailed { .. } => ErrorKind::RolloutFailed,
            DeployError::RolloutTimeout { .. } => ErrorKind::RolloutTimeout,
            DeployError::LockHeld { .. } => ErrorKind::LockHeld,
            DeployError::Process(_) => ErrorKind::Process,
        }
    }
}
