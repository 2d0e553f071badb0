// ABOUTME: Deploy command implementation.
// ABOUTME: Rolls the commit image out to one environment outside of a pipeline run.

use super::Invocation;
use crate::cli::ContextArgs;
use kedge::deploy::{Approval, DeployOptions, run_deployment};
use kedge::diagnostics::Diagnostics;
use kedge::error::Result;
use kedge::types::EnvironmentName;

pub async fn deploy(
    mut invocation: Invocation,
    environment: EnvironmentName,
    context: &ContextArgs,
    approve: bool,
    force: bool,
) -> Result<()> {
    let ctx = invocation.context(context)?;
    let approval = approve.then(|| Approval::granted(format!("--approve {}", environment)));

    invocation.output.start_timer();
    invocation.output.progress(&format!(
        "Deploying {} ({}) to {}",
        invocation.config.app,
        ctx.short_sha(),
        environment
    ));

    let mut diagnostics = Diagnostics::default();
    let result = run_deployment(
        invocation.runner(),
        &invocation.config,
        environment,
        &ctx,
        approval,
        DeployOptions { force_lock: force },
        &mut diagnostics,
    )
    .await;
    invocation.finish(&diagnostics);

    invocation.output.deployed(&result?);
    Ok(())
}
