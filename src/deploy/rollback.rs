// ABOUTME: Rollout status inspection and operator-initiated rollback.
// ABOUTME: Rollback is never automatic; it runs only from the rollback command.

use super::{DeployError, Kubectl};
use crate::process::{CommandOutput, ProcessRunner};
use crate::types::ResourceName;

/// One reading of `kubectl rollout status --watch=false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloutStatus {
    Complete,
    Progressing(String),
    /// The deployment exceeded its progress deadline.
    Failed(String),
}

impl RolloutStatus {
    /// Classify a status command's output; `None` when the poll itself failed.
    pub fn from_output(output: &CommandOutput, accepted: bool) -> Option<Self> {
        let text = output.diagnostic();
        if text.contains("exceeded its progress deadline") {
            return Some(RolloutStatus::Failed(text.to_string()));
        }
        if !accepted {
            return None;
        }
        if output.stdout.contains("successfully rolled out") {
            Some(RolloutStatus::Complete)
        } else {
            Some(RolloutStatus::Progressing(text.to_string()))
        }
    }
}

pub(crate) fn deployment_ref(deployment: &ResourceName) -> String {
    format!("deployment/{}", deployment)
}

/// Read the current rollout status once.
pub async fn rollout_status<R: ProcessRunner + ?Sized>(
    runner: &R,
    kubectl: &Kubectl,
    deployment: &ResourceName,
) -> Result<RolloutStatus, DeployError> {
    let command = kubectl.namespaced([
        "rollout".to_string(),
        "status".to_string(),
        deployment_ref(deployment),
        "--watch=false".to_string(),
    ]);
    let output = runner.run(&command).await?;

    RolloutStatus::from_output(&output, command.accepts(&output)).ok_or_else(|| {
        DeployError::RolloutFailed {
            deployment: deployment.to_string(),
            reason: output.diagnostic().to_string(),
        }
    })
}

/// Revision history as printed by kubectl.
pub async fn rollout_history<R: ProcessRunner + ?Sized>(
    runner: &R,
    kubectl: &Kubectl,
    deployment: &ResourceName,
) -> Result<String, DeployError> {
    let command = kubectl.namespaced([
        "rollout".to_string(),
        "history".to_string(),
        deployment_ref(deployment),
    ]);
    let output = runner.run(&command).await?;
    if !command.accepts(&output) {
        return Err(DeployError::RolloutFailed {
            deployment: deployment.to_string(),
            reason: output.diagnostic().to_string(),
        });
    }
    Ok(output.stdout)
}

/// Roll the deployment back to the previous (or given) revision.
pub async fn rollback<R: ProcessRunner + ?Sized>(
    runner: &R,
    kubectl: &Kubectl,
    deployment: &ResourceName,
    to_revision: Option<u32>,
) -> Result<(), DeployError> {
    let mut command = kubectl.namespaced([
        "rollout".to_string(),
        "undo".to_string(),
        deployment_ref(deployment),
    ]);
    if let Some(revision) = to_revision {
        command = command.arg(format!("--to-revision={}", revision));
    }

    let output = runner.run(&command).await?;
    if !command.accepts(&output) {
        return Err(DeployError::Rollback {
            deployment: deployment.to_string(),
            reason: output.diagnostic().to_string(),
        });
    }

    tracing::info!(deployment = %deployment, "Rollback started");
    Ok(())
}
