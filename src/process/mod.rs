// ABOUTME: Uniform process-runner abstraction for external tools.
// ABOUTME: Every docker, kubectl and script invocation goes through ProcessRunner.

mod command;
mod error;
mod recording;
mod system;

pub use command::{Command, CommandOutput};
pub use error::{ProcessError, SpawnSnafu, StdinSnafu, TimeoutSnafu};
pub use recording::RecordingRunner;
pub use system::SystemRunner;

use async_trait::async_trait;

/// Runs typed commands and reports their output.
///
/// A non-zero exit status is not an error at this layer; callers compare the
/// exit code against [`Command::expected_exit_code`] via [`Command::accepts`].
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: &Command) -> Result<CommandOutput, ProcessError>;
}
