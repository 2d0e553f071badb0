// ABOUTME: Process runner error types with SNAFU pattern.
// ABOUTME: Covers spawn, stdin and timeout failures of external tools.

use snafu::Snafu;
use std::time::Duration;

/// Failure to run an external tool at all (as opposed to it exiting non-zero).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProcessError {
    #[snafu(display("failed to run {program}: {source}"))]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[snafu(display("failed to write stdin of {program}: {source}"))]
    Stdin {
        program: String,
        source: std::io::Error,
    },

    #[snafu(display("{program} did not finish within {}s", timeout.as_secs()))]
    Timeout { program: String, timeout: Duration },
}

impl ProcessError {
    /// Whether the tool was started but did not finish in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProcessError::Timeout { .. })
    }
}
