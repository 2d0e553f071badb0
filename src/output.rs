// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::deploy::DeployOutcome;
use crate::diagnostics::Warning;
use crate::pipeline::{JobOutcome, PipelineReport, Plan};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => emit(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print a non-fatal warning.
    pub fn warning(&self, warning: &Warning) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {}", warning.message),
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(&WarningEvent {
                    event: "warning",
                    warning,
                }) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.duration(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print the eligible stages and jobs for this commit.
    pub fn plan(&self, plan: &Plan<'_>) {
        match self.mode {
            OutputMode::Normal => {
                if plan.is_empty() {
                    println!("No jobs are eligible for this commit.");
                    return;
                }
                for stage in plan.stages() {
                    println!("{}", stage.name);
                    for job in &stage.jobs {
                        let mut flags = Vec::new();
                        if job.is_manual() {
                            flags.push("manual");
                        }
                        if job.allow_failure {
                            flags.push("allow failure");
                        }
                        let flags = if flags.is_empty() {
                            String::new()
                        } else {
                            format!(" [{}]", flags.join(", "))
                        };
                        println!("  {:<24} {}{}", job.name, job.action.describe(), flags);
                    }
                }
            }
            OutputMode::Quiet => println!("{}", plan.job_names().join(" ")),
            OutputMode::Json => {
                let stages: Vec<PlanStageJson<'_>> = plan
                    .stages()
                    .iter()
                    .map(|s| PlanStageJson {
                        name: s.name.as_str(),
                        jobs: s.jobs.iter().map(|j| j.name.as_str()).collect(),
                    })
                    .collect();
                emit(&PlanEvent {
                    event: "plan",
                    stages,
                });
            }
        }
    }

    /// Print the per-job outcome table for a pipeline run.
    pub fn report(&self, report: &PipelineReport) {
        match self.mode {
            OutputMode::Normal => {
                for stage in &report.stages {
                    println!("{} ({:.1}s)", stage.name, stage.duration.as_secs_f64());
                    for job in &stage.jobs {
                        let detail = match &job.outcome {
                            JobOutcome::Failed { error } | JobOutcome::AllowedFailure { error } => {
                                format!(": {error}")
                            }
                            _ => String::new(),
                        };
                        println!(
                            "  {:<24} {:<16} {:>6.1}s{}",
                            job.name,
                            job.outcome.label(),
                            job.duration.as_secs_f64(),
                            detail
                        );
                    }
                }
            }
            OutputMode::Quiet => {
                for job in report.jobs() {
                    if job.outcome.is_blocking() {
                        println!("{} {}", job.name, job.outcome.label());
                    }
                }
            }
            OutputMode::Json => emit(&ReportEvent {
                event: "report",
                report,
            }),
        }
    }

    /// Print a finished deployment.
    pub fn deployed(&self, outcome: &DeployOutcome) {
        match self.mode {
            OutputMode::Json => emit(&DeployEvent {
                event: "deployed",
                outcome,
            }),
            _ => {
                let url = outcome
                    .url
                    .as_deref()
                    .map(|u| format!(" at {u}"))
                    .unwrap_or_default();
                self.success(&format!(
                    "Deployed {} to {}{}",
                    outcome.image, outcome.environment, url
                ));
            }
        }
    }

    /// Print commands a dry run would have executed.
    pub fn dry_run(&self, lines: &[String]) {
        match self.mode {
            OutputMode::Json => emit(&DryRunEvent {
                event: "dry_run",
                commands: lines,
            }),
            _ => {
                println!("Dry run, {} command(s) not executed:", lines.len());
                for line in lines {
                    println!("  $ {line}");
                }
            }
        }
    }
}

fn emit<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct WarningEvent<'a> {
    event: &'a str,
    #[serde(flatten)]
    warning: &'a Warning,
}

#[derive(Serialize)]
struct PlanStageJson<'a> {
    name: &'a str,
    jobs: Vec<&'a str>,
}

#[derive(Serialize)]
struct PlanEvent<'a> {
    event: &'a str,
    stages: Vec<PlanStageJson<'a>>,
}

#[derive(Serialize)]
struct ReportEvent<'a> {
    event: &'a str,
    #[serde(flatten)]
    report: &'a PipelineReport,
}

#[derive(Serialize)]
struct DeployEvent<'a> {
    event: &'a str,
    #[serde(flatten)]
    outcome: &'a DeployOutcome,
}

#[derive(Serialize)]
struct DryRunEvent<'a> {
    event: &'a str,
    commands: &'a [String],
}
