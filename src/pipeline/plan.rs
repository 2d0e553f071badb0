// ABOUTME: The eligible subset of a pipeline for one commit event.
// ABOUTME: Stages without eligible jobs are dropped; order is preserved.

use super::Job;
use crate::types::StageName;

#[derive(Debug, Clone)]
pub struct PlannedStage<'a> {
    pub name: &'a StageName,
    pub jobs: Vec<&'a Job>,
}

#[derive(Debug, Clone)]
pub struct Plan<'a> {
    pub(crate) stages: Vec<PlannedStage<'a>>,
}

impl<'a> Plan<'a> {
    pub fn stages(&self) -> &[PlannedStage<'a>] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &'a Job> + '_ {
        self.stages.iter().flat_map(|s| s.jobs.iter().copied())
    }

    /// Names of eligible jobs in execution order.
    pub fn job_names(&self) -> Vec<&'a str> {
        self.jobs().map(|j| j.name.as_str()).collect()
    }
}
