// ABOUTME: Pipeline stage runner: stages, jobs, gating, planning and execution.
// ABOUTME: Stages run in order; jobs of one stage run concurrently behind a barrier.

mod executor;
mod job;
mod plan;
mod report;
mod rules;
mod runner;

pub use executor::PipelineExecutor;
pub use job::{Job, JobAction, When};
pub use plan::{Plan, PlannedStage};
pub use report::{JobOutcome, JobReport, PipelineReport, PipelineStatus, StageReport};
pub use rules::{Rule, any_match};
pub use runner::{Approvals, JobExecutor, StageRunner};

use std::collections::HashSet;

use crate::context::PipelineContext;
use crate::error::{Error, Result};
use crate::types::{JobName, StageName};
use nonempty::NonEmpty;

/// A named phase holding jobs in definition order.
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: StageName,
    pub jobs: Vec<Job>,
}

/// The validated stage and job graph.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Group jobs under their stages, rejecting unknown stages and duplicate job names.
    pub fn new(stage_names: NonEmpty<StageName>, jobs: Vec<Job>) -> Result<Self> {
        let mut seen = HashSet::new();
        for job in &jobs {
            if !seen.insert(job.name.clone()) {
                return Err(Error::InvalidConfig(format!(
                    "job {} is defined twice",
                    job.name
                )));
            }
            if !stage_names.iter().any(|s| *s == job.stage) {
                return Err(Error::InvalidConfig(format!(
                    "job {} references unknown stage {}",
                    job.name, job.stage
                )));
            }
        }

        let stages = stage_names
            .into_iter()
            .map(|name| {
                let stage_jobs = jobs.iter().filter(|j| j.stage == name).cloned().collect();
                Stage {
                    name,
                    jobs: stage_jobs,
                }
            })
            .collect();

        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.stages.iter().flat_map(|s| s.jobs.iter())
    }

    pub fn job(&self, name: &JobName) -> Option<&Job> {
        self.jobs().find(|j| j.name == *name)
    }

    /// Evaluate every job's gating predicate and keep the eligible ones.
    pub fn plan(&self, ctx: &PipelineContext) -> Plan<'_> {
        let stages = self
            .stages
            .iter()
            .map(|stage| PlannedStage {
                name: &stage.name,
                jobs: stage.jobs.iter().filter(|j| j.is_eligible(ctx)).collect(),
            })
            .filter(|stage| !stage.jobs.is_empty())
            .collect();

        Plan { stages }
    }
}
