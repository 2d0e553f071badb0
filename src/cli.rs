// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands, global output flags and commit-context overrides.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use kedge::context::{ContextOverrides, PipelineSource};
use kedge::types::EnvironmentName;

#[derive(Parser)]
#[command(name = "kedge")]
#[command(about = "Build, publish and roll out an application from one typed pipeline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output for CI (only final result)
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Output JSON lines for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Record external commands instead of running them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Path to the configuration file (default: discover kedge.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Overrides for the commit event, used outside CI or to simulate one.
#[derive(Args, Debug, Clone, Default)]
pub struct ContextArgs {
    /// Commit SHA (default: CI_COMMIT_SHA)
    #[arg(long)]
    pub sha: Option<String>,

    /// Branch name (default: CI_COMMIT_BRANCH / CI_COMMIT_REF_NAME)
    #[arg(long, conflicts_with = "tag")]
    pub branch: Option<String>,

    /// Git tag being built (default: CI_COMMIT_TAG)
    #[arg(long)]
    pub tag: Option<String>,

    /// Pipeline source, e.g. push or merge_request_event (default: CI_PIPELINE_SOURCE)
    #[arg(long)]
    pub source: Option<PipelineSource>,

    /// Repository default branch (default: CI_DEFAULT_BRANCH, then config)
    #[arg(long)]
    pub default_branch: Option<String>,
}

impl ContextArgs {
    pub fn overrides(&self) -> ContextOverrides {
        ContextOverrides {
            sha: self.sha.clone(),
            branch: self.branch.clone(),
            tag: self.tag.clone(),
            source: self.source,
            default_branch: self.default_branch.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new kedge.yml configuration file
    Init {
        /// Application name (default: my-app)
        #[arg(long)]
        app: Option<String>,

        /// Overwrite existing files
        #[arg(long)]
        force: bool,

        /// Also write a Dockerfile and manifest templates
        #[arg(long)]
        scaffold: bool,
    },

    /// Show which stages and jobs run for a commit
    Plan {
        #[command(flatten)]
        context: ContextArgs,
    },

    /// Run every eligible stage in order
    Run {
        #[command(flatten)]
        context: ContextArgs,

        /// Approve a manual job for this run (repeatable)
        #[arg(long = "approve", value_name = "JOB")]
        approve: Vec<String>,

        /// Break a deploy lock held by another pipeline
        #[arg(long)]
        force: bool,
    },

    /// Run a single job
    Job {
        /// Job name from the configuration
        name: String,

        #[command(flatten)]
        context: ContextArgs,

        /// Approve the job if it is manual
        #[arg(long)]
        approve: bool,

        /// Break a deploy lock held by another pipeline
        #[arg(long)]
        force: bool,
    },

    /// Build the image and push every tag
    Publish {
        #[command(flatten)]
        context: ContextArgs,
    },

    /// Deploy the commit image to an environment
    Deploy {
        /// Target environment (development or production)
        environment: EnvironmentName,

        #[command(flatten)]
        context: ContextArgs,

        /// Approve a deploy to a protected environment
        #[arg(long)]
        approve: bool,

        /// Break a deploy lock held by another pipeline
        #[arg(long)]
        force: bool,
    },

    /// Roll an environment back to the previous revision
    Rollback {
        /// Target environment (development or production)
        environment: EnvironmentName,

        /// Revision to return to (default: previous)
        #[arg(long)]
        to_revision: Option<u32>,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Show rollout status and history of an environment
    Status {
        /// Target environment (development or production)
        environment: EnvironmentName,

        #[command(flatten)]
        context: ContextArgs,
    },
}
