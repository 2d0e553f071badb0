// ABOUTME: Entry point for the kedge CLI application.
// ABOUTME: Parses arguments, sets up logging and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::Invocation;
use kedge::error::Result;
use kedge::output::{Output, OutputMode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = output_mode(&cli);
    if let Err(e) = run(cli, mode).await {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

fn output_mode(cli: &Cli) -> OutputMode {
    if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    }
}

async fn run(cli: Cli, mode: OutputMode) -> Result<()> {
    let output = Output::new(mode);

    if let Commands::Init {
        app,
        force,
        scaffold,
    } = &cli.command
    {
        return commands::init(app.as_deref(), *force, *scaffold, output);
    }

    let invocation = Invocation::load(cli.config.as_deref(), output, cli.dry_run)?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Plan { context } => commands::plan(&invocation, &context),
        Commands::Run {
            context,
            approve,
            force,
        } => commands::run(invocation, &context, approve, force).await,
        Commands::Job {
            name,
            context,
            approve,
            force,
        } => commands::run_job(invocation, &name, &context, approve, force).await,
        Commands::Publish { context } => commands::publish(invocation, &context).await,
        Commands::Deploy {
            environment,
            context,
            approve,
            force,
        } => commands::deploy(invocation, environment, &context, approve, force).await,
        Commands::Rollback {
            environment,
            to_revision,
            context,
        } => commands::rollback(invocation, environment, to_revision, &context).await,
        Commands::Status {
            environment,
            context,
        } => commands::status(invocation, environment, &context).await,
    }
}
