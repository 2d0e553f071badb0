// ABOUTME: ProcessRunner backed by real child processes.
// ABOUTME: Pipes stdin/stdout/stderr and kills the child when its timeout elapses.

use async_trait::async_trait;
use snafu::ResultExt;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;

use super::error::{ProcessError, SpawnSnafu, StdinSnafu, TimeoutSnafu};
use super::{Command, CommandOutput, ProcessRunner};

/// Spawns commands on the local machine.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    default_timeout: Duration,
}

impl SystemRunner {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        // Image builds dominate; everything else passes its own timeout
        Self::new(Duration::from_secs(30 * 60))
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, command: &Command) -> Result<CommandOutput, ProcessError> {
        let program = command.program().to_string();
        let timeout = command.timeout_duration().unwrap_or(self.default_timeout);

        let mut cmd = tokio::process::Command::new(&program);
        cmd.args(command.raw_args())
            .envs(command.env_vars())
            .stdin(if command.stdin_data().is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = command.working_dir() {
            cmd.current_dir(dir);
        }

        tracing::debug!(command = %command, "running");

        let mut child = cmd.spawn().context(SpawnSnafu { program: &program })?;
        let stdin = child.stdin.take();

        // Feed stdin while waiting so a child that never reads it still hits the timeout
        let finished = async {
            let (fed, output) = tokio::join!(
                feed_stdin(stdin, command.stdin_data()),
                child.wait_with_output()
            );
            fed.context(StdinSnafu { program: &program })?;
            output.context(SpawnSnafu { program: &program })
        };
        let result = tokio::time::timeout(timeout, finished).await;

        let output = match result {
            Ok(output) => output?,
            Err(_elapsed) => return TimeoutSnafu { program, timeout }.fail(),
        };

        let output = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        tracing::debug!(command = %command, exit_code = ?output.exit_code, "finished");
        Ok(output)
    }
}

/// Write `input` and close the pipe. A child that exits without reading is
/// judged by its exit status, so a broken pipe is not an error.
async fn feed_stdin(stdin: Option<ChildStdin>, input: Option<&str>) -> std::io::Result<()> {
    let (Some(mut stdin), Some(input)) = (stdin, input) else {
        return Ok(());
    };
    match stdin.write_all(input.as_bytes()).await {
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        result => result,
    }
}
