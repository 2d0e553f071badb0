// ABOUTME: Per-job, per-stage and overall outcomes of a pipeline run.
// ABOUTME: Serializable so the JSON output mode can emit the full report.

use serde::Serialize;
use std::time::Duration;

/// How a single job ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Success,
    Failed { error: String },
    /// Failed, but the job allows failure; the pipeline continued.
    AllowedFailure { error: String },
    /// Manual job that was not approved for this run.
    Manual,
    /// Not run because an earlier stage failed.
    Skipped,
}

impl JobOutcome {
    /// Whether this outcome halts the pipeline.
    pub fn is_blocking(&self) -> bool {
        matches!(self, JobOutcome::Failed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Success => "success",
            JobOutcome::Failed { .. } => "failed",
            JobOutcome::AllowedFailure { .. } => "allowed_failure",
            JobOutcome::Manual => "manual",
            JobOutcome::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: JobOutcome,
    #[serde(rename = "duration_secs", serialize_with = "as_secs")]
    pub duration: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub name: String,
    pub jobs: Vec<JobReport>,
    #[serde(rename = "duration_secs", serialize_with = "as_secs")]
    pub duration: Duration,
}

impl StageReport {
    pub fn failed(&self) -> bool {
        self.jobs.iter().any(|j| j.outcome.is_blocking())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub reference: String,
    pub commit: String,
    pub status: PipelineStatus,
    pub stages: Vec<StageReport>,
    #[serde(rename = "duration_secs", serialize_with = "as_secs")]
    pub duration: Duration,
}

impl PipelineReport {
    pub(crate) fn new(
        reference: &str,
        commit: &str,
        stages: Vec<StageReport>,
        duration: Duration,
    ) -> Self {
        let status = if stages.iter().any(StageReport::failed) {
            PipelineStatus::Failed
        } else {
            PipelineStatus::Success
        };
        Self {
            reference: reference.to_string(),
            commit: commit.to_string(),
            status,
            stages,
            duration,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == PipelineStatus::Success
    }

    pub fn jobs(&self) -> impl Iterator<Item = &JobReport> {
        self.stages.iter().flat_map(|s| s.jobs.iter())
    }

    pub fn job(&self, name: &str) -> Option<&JobReport> {
        self.jobs().find(|j| j.name == name)
    }

    /// Names of jobs whose failure halted the pipeline.
    pub fn failed_jobs(&self) -> Vec<String> {
        self.jobs()
            .filter(|j| j.outcome.is_blocking())
            .map(|j| j.name.clone())
            .collect()
    }
}

fn as_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64((d.as_secs_f64() * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(name: &str, outcome: JobOutcome) -> JobReport {
        JobReport {
            name: name.to_string(),
            outcome,
            duration: Duration::from_millis(1500),
        }
    }

    #[test]
    fn allowed_failure_does_not_fail_pipeline() {
        let stages = vec![StageReport {
            name: "lint".to_string(),
            jobs: vec![job(
                "lint",
                JobOutcome::AllowedFailure {
                    error: "exit 1".to_string(),
                },
            )],
            duration: Duration::ZERO,
        }];
        let report = PipelineReport::new("main", "abc12345", stages, Duration::ZERO);
        assert!(report.succeeded());
        assert!(report.failed_jobs().is_empty());
    }

    #[test]
    fn json_flattens_outcome() {
        let value = serde_json::to_value(job(
            "test",
            JobOutcome::Failed {
                error: "boom".to_string(),
            },
        ))
        .unwrap();
        assert_eq!(value["outcome"], "failed");
        assert_eq!(value["error"], "boom");
        assert_eq!(value["duration_secs"], 1.5);
    }
}
