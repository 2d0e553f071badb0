// ABOUTME: Rollback and status command implementations.
// ABOUTME: Operator-initiated; neither runs as part of a pipeline.

use super::Invocation;
use crate::cli::ContextArgs;
use kedge::deploy::{
    DeployError, DeployTarget, RolloutStatus, authenticate, rollback as undo, rollout_history,
    rollout_status,
};
use kedge::diagnostics::Diagnostics;
use kedge::error::Result;
use kedge::types::EnvironmentName;

/// Roll an environment's deployment back to an earlier revision.
pub async fn rollback(
    mut invocation: Invocation,
    environment: EnvironmentName,
    to_revision: Option<u32>,
    context: &ContextArgs,
) -> Result<()> {
    let ctx = invocation.context(context)?;
    let target = DeployTarget::from_config(&invocation.config, environment)?;

    invocation.output.start_timer();
    invocation.output.progress(&format!(
        "Rolling back {} in {}",
        target.deployment, target.namespace
    ));

    let runner = invocation.runner();
    let result = async {
        let kubectl = authenticate(runner, &target, &ctx).await?;
        undo(runner, &kubectl, &target.deployment, to_revision).await?;
        Ok::<_, DeployError>(())
    }
    .await;
    invocation.finish(&Diagnostics::default());
    result?;

    invocation
        .output
        .success(&format!("Rollback of {} started", target.deployment));
    Ok(())
}

/// Print the current rollout status and revision history.
pub async fn status(
    invocation: Invocation,
    environment: EnvironmentName,
    context: &ContextArgs,
) -> Result<()> {
    let ctx = invocation.context(context)?;
    let target = DeployTarget::from_config(&invocation.config, environment)?;

    let runner = invocation.runner();
    let result = async {
        let kubectl = authenticate(runner, &target, &ctx).await?;
        let status = rollout_status(runner, &kubectl, &target.deployment).await?;
        let history = rollout_history(runner, &kubectl, &target.deployment).await?;
        Ok::<_, DeployError>((status, history))
    }
    .await;
    invocation.finish(&Diagnostics::default());
    let (status, history) = result?;

    let summary = match &status {
        RolloutStatus::Complete => "rolled out".to_string(),
        RolloutStatus::Progressing(detail) => format!("in progress: {}", detail),
        RolloutStatus::Failed(reason) => format!("failed: {}", reason),
    };
    invocation.output.progress(history.trim_end());
    invocation.output.success(&format!(
        "{} in {}: {}",
        target.deployment, target.namespace, summary
    ));
    Ok(())
}
