// ABOUTME: Validated job definitions: stage, gating rules, action and failure policy.
// ABOUTME: Jobs are static configuration loaded once per invocation.

use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::rules::{Rule, any_match};
use crate::context::PipelineContext;
use crate::types::{EnvironmentName, JobName, StageName};

/// When an eligible job starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum When {
    /// As soon as its stage is reached.
    #[default]
    OnSuccess,
    /// Only after an explicit operator approval.
    Manual,
}

/// What a job does once it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobAction {
    /// Shell lines run in order; the first failing line fails the job.
    Script(NonEmpty<String>),
    /// Build and push the application image.
    Publish,
    /// Roll the current commit's image out to an environment.
    Deploy(EnvironmentName),
}

impl JobAction {
    pub fn describe(&self) -> String {
        match self {
            JobAction::Script(lines) => format!("script ({} line(s))", lines.len()),
            JobAction::Publish => "publish image".to_string(),
            JobAction::Deploy(env) => format!("deploy to {}", env),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub name: JobName,
    pub stage: StageName,
    pub rules: Vec<Rule>,
    pub action: JobAction,
    pub allow_failure: bool,
    pub when: When,
    pub timeout: Option<Duration>,
}

impl Job {
    /// Evaluate the gating predicate for this commit event.
    pub fn is_eligible(&self, ctx: &PipelineContext) -> bool {
        any_match(&self.rules, ctx)
    }

    pub fn is_manual(&self) -> bool {
        self.when == When::Manual
    }
}
