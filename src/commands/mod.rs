// ABOUTME: Command module aggregator for the kedge CLI.
// ABOUTME: Shared invocation state: loaded config, output mode and the process runner.

mod deploy;
mod init;
mod plan;
mod publish;
mod rollback;
mod run;

pub use deploy::deploy;
pub use init::init;
pub use plan::plan;
pub use publish::publish;
pub use rollback::{rollback, status};
pub use run::{run, run_job};

use std::path::Path;

use crate::cli::ContextArgs;
use kedge::config::Config;
use kedge::context::PipelineContext;
use kedge::diagnostics::Diagnostics;
use kedge::error::Result;
use kedge::output::Output;
use kedge::process::{ProcessRunner, RecordingRunner, SystemRunner};

enum Runner {
    System(SystemRunner),
    DryRun(RecordingRunner),
}

/// Everything a subcommand needs after argument parsing.
pub struct Invocation {
    pub config: Config,
    pub output: Output,
    runner: Runner,
}

impl Invocation {
    pub fn load(config_path: Option<&Path>, output: Output, dry_run: bool) -> Result<Self> {
        let config = match config_path {
            Some(path) => Config::load(path)?,
            None => Config::discover(&std::env::current_dir()?)?,
        };
        let runner = if dry_run {
            Runner::DryRun(RecordingRunner::dry_run())
        } else {
            Runner::System(SystemRunner::default())
        };

        Ok(Self {
            config,
            output,
            runner,
        })
    }

    pub fn runner(&self) -> &dyn ProcessRunner {
        match &self.runner {
            Runner::System(runner) => runner,
            Runner::DryRun(runner) => runner,
        }
    }

    pub fn context(&self, args: &ContextArgs) -> Result<PipelineContext> {
        PipelineContext::from_env(&args.overrides(), &self.config.default_branch)
    }

    /// Print collected warnings and, for dry runs, the commands that were skipped.
    pub fn finish(&self, diagnostics: &Diagnostics) {
        for warning in diagnostics.warnings() {
            self.output.warning(warning);
        }
        if let Runner::DryRun(runner) = &self.runner {
            self.output.dry_run(&runner.lines());
        }
    }
}
