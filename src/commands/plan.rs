// ABOUTME: Plan command implementation.
// ABOUTME: Prints the stages and jobs eligible for the current commit event.

use super::Invocation;
use crate::cli::ContextArgs;
use kedge::error::Result;

pub fn plan(invocation: &Invocation, context: &ContextArgs) -> Result<()> {
    let ctx = invocation.context(context)?;
    let pipeline = invocation.config.pipeline()?;
    let plan = pipeline.plan(&ctx);

    invocation.output.progress(&format!(
        "Plan for {} ({}, {})",
        ctx.ref_name(),
        ctx.short_sha(),
        ctx.source()
    ));
    invocation.output.plan(&plan);
    Ok(())
}
