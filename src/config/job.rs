// ABOUTME: Job entries as written in kedge.yml.
// ABOUTME: Converted into validated pipeline jobs with exactly one action.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::pipeline::{Job, JobAction, Rule, When};
use crate::types::{EnvironmentName, JobName, StageName};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    pub name: JobName,

    pub stage: StageName,

    /// OR-combined; an empty list always matches.
    #[serde(default)]
    pub rules: Vec<Rule>,

    #[serde(default)]
    pub script: Vec<String>,

    #[serde(default)]
    pub publish: bool,

    #[serde(default)]
    pub deploy: Option<EnvironmentName>,

    #[serde(default)]
    pub allow_failure: bool,

    #[serde(default)]
    pub when: When,

    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl JobConfig {
    pub fn to_job(&self) -> Result<Job> {
        let action = match (
            NonEmpty::from_vec(self.script.clone()),
            self.publish,
            self.deploy,
        ) {
            (Some(lines), false, None) => JobAction::Script(lines),
            (None, true, None) => JobAction::Publish,
            (None, false, Some(env)) => JobAction::Deploy(env),
            (None, false, None) => {
                return Err(Error::InvalidConfig(format!(
                    "job {} needs one of `script`, `publish` or `deploy`",
                    self.name
                )));
            }
            _ => {
                return Err(Error::InvalidConfig(format!(
                    "job {} sets more than one of `script`, `publish` and `deploy`",
                    self.name
                )));
            }
        };

        Ok(Job {
            name: self.name.clone(),
            stage: self.stage.clone(),
            rules: self.rules.clone(),
            action,
            allow_failure: self.allow_failure,
            when: self.when,
            timeout: self.timeout,
        })
    }
}
