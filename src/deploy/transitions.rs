// ABOUTME: State transition methods for deployment orchestration.
// ABOUTME: Each method consumes self and returns the next state on success.

use tokio::time::Instant;

use super::kubectl::authenticate;
use super::rollback::{RolloutStatus, deployment_ref};
use super::state::{
    Authenticated, Initialized, ManifestsApplied, NamespaceEnsured, RolloutComplete,
    RolloutFailed, RolloutInProgress,
};
use super::{DeployError, Deployment};
use crate::context::PipelineContext;
use crate::process::ProcessRunner;

/// Result type for transitions whose failure still yields a (terminal) state.
pub type TransitionResult<T, F> = Result<Deployment<T>, (Deployment<F>, DeployError)>;

impl<S> Deployment<S> {
    fn transition<T>(self, state: T) -> Deployment<T> {
        Deployment {
            target: self.target,
            image: self.image,
            manifests: self.manifests,
            state,
        }
    }
}

// =============================================================================
// Initialized -> Authenticated
// =============================================================================

impl Deployment<Initialized> {
    /// Establish cluster credentials and verify access.
    ///
    /// Uses the configured kube context, or builds one for the agent proxy
    /// from the agent id and the CI job token.
    #[must_use = "deployment state must be used"]
    pub async fn authenticate<R: ProcessRunner + ?Sized>(
        self,
        runner: &R,
        ctx: &PipelineContext,
    ) -> Result<Deployment<Authenticated>, DeployError> {
        if let Some(approval) = self.approval() {
            tracing::info!(environment = %self.target.environment, %approval, "Deploy approved");
        }
        let kubectl = authenticate(runner, &self.target, ctx).await?;
        Ok(self.transition(Authenticated { kubectl }))
    }
}

// =============================================================================
// Authenticated -> NamespaceEnsured
// =============================================================================

impl Deployment<Authenticated> {
    /// Create the namespace; an existing namespace counts as success.
    #[must_use = "deployment state must be used"]
    pub async fn ensure_namespace<R: ProcessRunner + ?Sized>(
        self,
        runner: &R,
    ) -> Result<Deployment<NamespaceEnsured>, DeployError> {
        let namespace = self.target.namespace.as_str();
        let command = self
            .state
            .kubectl
            .cluster(["create", "namespace", namespace]);
        let output = runner.run(&command).await?;

        if command.accepts(&output) {
            tracing::info!(namespace, "Namespace created");
        } else if is_already_exists(output.diagnostic()) {
            tracing::debug!(namespace, "Namespace already exists");
        } else {
            return Err(DeployError::apply(
                format!("namespace {}", namespace),
                output.diagnostic(),
            ));
        }

        let kubectl = self.state.kubectl.clone();
        Ok(self.transition(NamespaceEnsured { kubectl }))
    }
}

// =============================================================================
// NamespaceEnsured -> ManifestsApplied
// =============================================================================

impl Deployment<NamespaceEnsured> {
    /// Apply deployment, service and ingress, in that order, via stdin.
    #[must_use = "deployment state must be used"]
    pub async fn apply_manifests<R: ProcessRunner + ?Sized>(
        self,
        runner: &R,
    ) -> Result<Deployment<ManifestsApplied>, DeployError> {
        let mut applied = Vec::with_capacity(self.manifests.len());

        for manifest in &self.manifests {
            let command = self
                .state
                .kubectl
                .namespaced(["apply", "-f", "-"])
                .stdin(manifest.content.as_str());
            let output = runner.run(&command).await?;

            if !command.accepts(&output) {
                return Err(DeployError::apply(
                    format!("{} manifest {}", manifest.kind, manifest.source.display()),
                    output.diagnostic(),
                ));
            }
            tracing::info!(kind = %manifest.kind, "{}", output.stdout.trim());
            applied.push(manifest.kind);
        }

        let kubectl = self.state.kubectl.clone();
        Ok(self.transition(ManifestsApplied { kubectl, applied }))
    }
}

// =============================================================================
// ManifestsApplied -> RolloutInProgress
// =============================================================================

impl Deployment<ManifestsApplied> {
    /// Begin watching the rollout the apply triggered.
    #[must_use = "deployment state must be used"]
    pub fn start_rollout(self) -> Deployment<RolloutInProgress> {
        tracing::info!(
            deployment = %self.target.deployment,
            timeout = ?self.target.rollout_timeout,
            "Waiting for rollout"
        );
        let kubectl = self.state.kubectl.clone();
        self.transition(RolloutInProgress {
            kubectl,
            started: Instant::now(),
        })
    }
}

// =============================================================================
// RolloutInProgress -> RolloutComplete | RolloutFailed
// =============================================================================

impl Deployment<RolloutInProgress> {
    /// Poll rollout status until ready, failed, or the rollout timeout passes.
    ///
    /// Each poll is cut off at the deadline, so the wait never exceeds the
    /// rollout timeout. Polls that fail to reach the cluster are tolerated up
    /// to `max_poll_failures` in a row.
    #[must_use = "deployment state must be used"]
    pub async fn await_rollout<R: ProcessRunner + ?Sized>(
        self,
        runner: &R,
    ) -> TransitionResult<RolloutComplete, RolloutFailed> {
        let timeout = self.target.rollout_timeout;
        let deadline = self.state.started + timeout;
        let deployment = self.target.deployment.to_string();
        let mut consecutive_failures = 0u32;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.fail(DeployError::RolloutTimeout {
                    deployment,
                    timeout,
                }));
            }

            let command = self.state.kubectl.namespaced([
                "rollout".to_string(),
                "status".to_string(),
                deployment_ref(&self.target.deployment),
                "--watch=false".to_string(),
            ]);

            let polled = match tokio::time::timeout(remaining, runner.run(&command)).await {
                Err(_elapsed) => {
                    return Err(self.fail(DeployError::RolloutTimeout {
                        deployment,
                        timeout,
                    }));
                }
                Ok(Ok(output)) => RolloutStatus::from_output(&output, command.accepts(&output))
                    .ok_or_else(|| output.diagnostic().to_string()),
                Ok(Err(e)) => Err(e.to_string()),
            };

            match polled {
                Ok(RolloutStatus::Complete) => {
                    let elapsed = self.state.started.elapsed();
                    tracing::info!(deployment = %deployment, ?elapsed, "Rollout complete");
                    return Ok(self.transition(RolloutComplete { elapsed }));
                }
                Ok(RolloutStatus::Failed(reason)) => {
                    return Err(self.fail(DeployError::RolloutFailed { deployment, reason }));
                }
                Ok(RolloutStatus::Progressing(status)) => {
                    consecutive_failures = 0;
                    tracing::debug!(deployment = %deployment, status = %status, "Rollout in progress");
                }
                Err(reason) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        "Rollout status poll failed ({}/{}): {}",
                        consecutive_failures,
                        self.target.max_poll_failures,
                        reason
                    );
                    if consecutive_failures >= self.target.max_poll_failures {
                        return Err(self.fail(DeployError::RolloutFailed {
                            deployment,
                            reason: format!(
                                "cluster unreachable after {} status polls: {}",
                                consecutive_failures, reason
                            ),
                        }));
                    }
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(self.target.poll_interval.min(remaining)).await;
        }
    }

    fn fail(self, error: DeployError) -> (Deployment<RolloutFailed>, DeployError) {
        let elapsed = self.state.started.elapsed();
        tracing::error!(deployment = %self.target.deployment, error = %error, "Rollout failed");
        (self.transition(RolloutFailed { elapsed }), error)
    }
}

fn is_already_exists(diagnostic: &str) -> bool {
    diagnostic.contains("AlreadyExists") || diagnostic.contains("already exists")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_already_exists() {
        assert!(is_already_exists(
            "Error from server (AlreadyExists): namespaces \"app-dev\" already exists"
        ));
        assert!(!is_already_exists("Error from server (Forbidden)"));
    }
}
