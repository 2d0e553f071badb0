// ABOUTME: Stage runner: executes a plan stage by stage with a barrier between stages.
// ABOUTME: Jobs in a stage fan out concurrently; a required failure skips later stages.

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use super::{Job, JobOutcome, JobReport, Pipeline, PipelineReport, Plan, StageReport};
use crate::context::PipelineContext;
use crate::deploy::Approval;
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::{Error, Result};

/// Performs the action of a single job.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(
        &self,
        job: &Job,
        ctx: &PipelineContext,
        approval: Option<Approval>,
    ) -> Result<()>;
}

/// Job names the operator approved for this invocation.
#[derive(Debug, Clone, Default)]
pub struct Approvals {
    jobs: BTreeSet<String>,
}

impl Approvals {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn for_jobs<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            jobs: names.into_iter().map(Into::into).collect(),
        }
    }

    /// The approval token for `job`, if the operator named it.
    pub fn approve(&self, job: &Job) -> Option<Approval> {
        self.jobs
            .contains(job.name.as_str())
            .then(|| Approval::granted(job.name.as_str()))
    }

    /// Approved names that match no job in `pipeline`.
    pub fn unknown<'a>(&'a self, pipeline: &Pipeline) -> Vec<&'a str> {
        self.jobs
            .iter()
            .filter(|name| pipeline.jobs().all(|j| j.name != name.as_str()))
            .map(String::as_str)
            .collect()
    }
}

pub struct StageRunner<'a, E: ?Sized> {
    executor: &'a E,
    approvals: &'a Approvals,
}

impl<'a, E: JobExecutor + ?Sized> StageRunner<'a, E> {
    pub fn new(executor: &'a E, approvals: &'a Approvals) -> Self {
        Self {
            executor,
            approvals,
        }
    }

    /// Run every stage of `plan` in order.
    ///
    /// Allow-failure jobs that fail are recorded in `diagnostics`; a required
    /// failure lets its stage finish and marks every later job as skipped.
    pub async fn run(
        &self,
        plan: &Plan<'_>,
        ctx: &PipelineContext,
        diagnostics: &mut Diagnostics,
    ) -> PipelineReport {
        let started = Instant::now();
        let mut stages = Vec::with_capacity(plan.stages().len());
        let mut halted = false;

        for stage in plan.stages() {
            if halted {
                tracing::info!(stage = %stage.name, "Skipping stage after earlier failure");
                stages.push(StageReport {
                    name: stage.name.to_string(),
                    jobs: stage
                        .jobs
                        .iter()
                        .map(|job| JobReport {
                            name: job.name.to_string(),
                            outcome: JobOutcome::Skipped,
                            duration: Duration::ZERO,
                        })
                        .collect(),
                    duration: Duration::ZERO,
                });
                continue;
            }

            tracing::info!(stage = %stage.name, jobs = stage.jobs.len(), "Starting stage");
            let stage_started = Instant::now();
            let jobs = join_all(stage.jobs.iter().map(|job| self.run_one(job, ctx))).await;

            for report in &jobs {
                if let JobOutcome::AllowedFailure { error } = &report.outcome {
                    diagnostics.warn(Warning::allowed_failure(&report.name, error));
                }
            }

            let report = StageReport {
                name: stage.name.to_string(),
                jobs,
                duration: stage_started.elapsed(),
            };
            if report.failed() {
                tracing::error!(stage = %stage.name, "Stage failed, halting pipeline");
                halted = true;
            }
            stages.push(report);
        }

        PipelineReport::new(ctx.ref_name(), ctx.short_sha(), stages, started.elapsed())
    }

    /// Run one job by name, outside of stage ordering.
    ///
    /// Refuses jobs whose rules do not match this commit and manual jobs
    /// without approval.
    pub async fn run_job(
        &self,
        pipeline: &Pipeline,
        name: &str,
        ctx: &PipelineContext,
        diagnostics: &mut Diagnostics,
    ) -> Result<JobReport> {
        let job = pipeline
            .jobs()
            .find(|j| j.name == name)
            .ok_or_else(|| Error::UnknownJob(name.to_string()))?;

        if !job.is_eligible(ctx) {
            return Err(Error::JobNotEligible {
                job: name.to_string(),
                reference: ctx.ref_name().to_string(),
            });
        }

        let approval = self.approvals.approve(job);
        if job.is_manual() && approval.is_none() {
            return Err(Error::ManualJob {
                job: name.to_string(),
            });
        }

        let started = Instant::now();
        let outcome = match self.execute(job, ctx, approval).await {
            Ok(()) => JobOutcome::Success,
            Err(e) if job.allow_failure => {
                diagnostics.warn(Warning::allowed_failure(name, &e));
                JobOutcome::AllowedFailure {
                    error: e.to_string(),
                }
            }
            Err(e) => return Err(e),
        };

        Ok(JobReport {
            name: name.to_string(),
            outcome,
            duration: started.elapsed(),
        })
    }

    async fn run_one(&self, job: &Job, ctx: &PipelineContext) -> JobReport {
        let approval = self.approvals.approve(job);
        if job.is_manual() && approval.is_none() {
            tracing::info!(job = %job.name, "Manual job awaiting approval");
            return JobReport {
                name: job.name.to_string(),
                outcome: JobOutcome::Manual,
                duration: Duration::ZERO,
            };
        }

        let started = Instant::now();
        let outcome = match self.execute(job, ctx, approval).await {
            Ok(()) => {
                tracing::info!(job = %job.name, "Job succeeded");
                JobOutcome::Success
            }
            Err(e) if job.allow_failure => JobOutcome::AllowedFailure {
                error: e.to_string(),
            },
            Err(e) => {
                tracing::error!(job = %job.name, error = %e, "Job failed");
                JobOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        JobReport {
            name: job.name.to_string(),
            outcome,
            duration: started.elapsed(),
        }
    }

    async fn execute(
        &self,
        job: &Job,
        ctx: &PipelineContext,
        approval: Option<Approval>,
    ) -> Result<()> {
        // Gating precedes any command, even for jobs that reached here by name
        if !job.is_eligible(ctx) {
            return Err(Error::JobNotEligible {
                job: job.name.to_string(),
                reference: ctx.ref_name().to_string(),
            });
        }

        tracing::debug!(job = %job.name, action = %job.action.describe(), "Executing job");
        match job.timeout {
            Some(limit) => tokio::time::timeout(limit, self.executor.execute(job, ctx, approval))
                .await
                .map_err(|_| Error::JobTimedOut {
                    job: job.name.to_string(),
                    timeout: limit,
                })?,
            None => self.executor.execute(job, ctx, approval).await,
        }
    }
}
