// ABOUTME: Run and job command implementations.
// ABOUTME: Execute the whole plan stage by stage, or one job by name.

use super::Invocation;
use crate::cli::ContextArgs;
use kedge::deploy::DeployOptions;
use kedge::diagnostics::Diagnostics;
use kedge::error::{Error, Result};
use kedge::pipeline::{Approvals, PipelineExecutor, StageRunner};

pub async fn run(
    mut invocation: Invocation,
    context: &ContextArgs,
    approve: Vec<String>,
    force: bool,
) -> Result<()> {
    let ctx = invocation.context(context)?;
    let pipeline = invocation.config.pipeline()?;
    let approvals = Approvals::for_jobs(approve);

    let unknown = approvals.unknown(&pipeline);
    if let Some(name) = unknown.first() {
        return Err(Error::UnknownJob(name.to_string()));
    }

    let plan = pipeline.plan(&ctx);
    invocation.output.start_timer();
    invocation.output.progress(&format!(
        "Running pipeline for {} ({})",
        ctx.ref_name(),
        ctx.short_sha()
    ));

    let executor = PipelineExecutor::new(
        invocation.runner(),
        &invocation.config,
        DeployOptions { force_lock: force },
    );
    let mut diagnostics = Diagnostics::default();
    let report = StageRunner::new(&executor, &approvals)
        .run(&plan, &ctx, &mut diagnostics)
        .await;
    diagnostics.extend(executor.take_diagnostics());

    invocation.output.report(&report);
    invocation.finish(&diagnostics);

    if report.succeeded() {
        invocation.output.success("Pipeline succeeded");
        Ok(())
    } else {
        Err(Error::PipelineFailed {
            failed: report.failed_jobs(),
        })
    }
}

pub async fn run_job(
    mut invocation: Invocation,
    name: &str,
    context: &ContextArgs,
    approve: bool,
    force: bool,
) -> Result<()> {
    let ctx = invocation.context(context)?;
    let pipeline = invocation.config.pipeline()?;
    let approvals = if approve {
        Approvals::for_jobs([name])
    } else {
        Approvals::none()
    };

    invocation.output.start_timer();
    invocation.output.progress(&format!("Running job {}", name));

    let executor = PipelineExecutor::new(
        invocation.runner(),
        &invocation.config,
        DeployOptions { force_lock: force },
    );
    let mut diagnostics = Diagnostics::default();
    let result = StageRunner::new(&executor, &approvals)
        .run_job(&pipeline, name, &ctx, &mut diagnostics)
        .await;
    diagnostics.extend(executor.take_diagnostics());
    invocation.finish(&diagnostics);

    let report = result?;
    invocation
        .output
        .success(&format!("Job {} {}", report.name, report.outcome.label()));
    Ok(())
}
