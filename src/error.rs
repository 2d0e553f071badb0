// ABOUTME: Application-wide error types for kedge.
// ABOUTME: Uses thiserror and exposes an ErrorKind taxonomy for programmatic handling.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::deploy::DeployError;
use crate::process::ProcessError;
use crate::publish::PublishError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("pipeline context incomplete: {0} is not set (pass it on the command line outside CI)")]
    MissingContext(&'static str),

    #[error("unknown job: {0}")]
    UnknownJob(String),

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("job {job} is not eligible for ref {reference}")]
    JobNotEligible { job: String, reference: String },

    #[error("job {job} requires manual approval (pass --approve)")]
    ManualJob { job: String },

    #[error("command `{command}` exited with {exit_code:?}: {stderr}")]
    Script {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("job {job} timed out after {timeout:?}")]
    JobTimedOut { job: String, timeout: Duration },

    #[error("pipeline failed: {}", failed.join(", "))]
    PipelineFailed { failed: Vec<String> },

    #[error("hook failed: {0}")]
    Hook(String),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Error categories shared by every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed configuration, including manifest placeholders.
    Config,
    /// Registry or cluster credentials were rejected.
    Auth,
    /// Image build failed.
    Build,
    /// Registry push failed.
    Push,
    /// Cluster rejected a manifest or namespace.
    Apply,
    /// Deployment never became ready within the rollout timeout.
    RolloutTimeout,
    /// Cluster reported the rollout as failed.
    RolloutFailed,
    /// A manual job or protected environment was run without approval.
    ApprovalRequired,
    /// Another deployment holds the environment lock.
    LockHeld,
    /// A job script command failed.
    Script,
    /// An external tool could not be run.
    Process,
    /// A lifecycle hook failed.
    Hook,
    /// Local I/O failure.
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AlreadyExists(_) | Error::Io(_) => ErrorKind::Io,
            Error::ConfigNotFound(_)
            | Error::InvalidConfig(_)
            | Error::MissingEnvVar(_)
            | Error::MissingContext(_)
            | Error::UnknownJob(_)
            | Error::UnknownEnvironment(_)
            | Error::JobNotEligible { .. }
            | Error::Yaml(_) => ErrorKind::Config,
            Error::ManualJob { .. } => ErrorKind::ApprovalRequired,
            Error::Script { .. } | Error::JobTimedOut { .. } | Error::PipelineFailed { .. } => {
                ErrorKind::Script
            }
            Error::Hook(_) => ErrorKind::Hook,
            Error::Deploy(e) => e.kind(),
            Error::Publish(e) => e.kind(),
            Error::Process(_) => ErrorKind::Process,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
