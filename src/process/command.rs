// ABOUTME: Typed command objects: tool, arguments, stdin, expected exit code, timeout.
// ABOUTME: Secret arguments and stdin are redacted whenever a command is displayed.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::Secret;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Arg {
    Plain(String),
    Secret(Secret),
}

impl Arg {
    fn raw(&self) -> &str {
        match self {
            Arg::Plain(s) => s,
            Arg::Secret(s) => s.expose(),
        }
    }
}

/// A single external tool invocation.
#[derive(Debug, Clone)]
pub struct Command {
    program: String,
    args: Vec<Arg>,
    env: BTreeMap<String, String>,
    stdin: Option<Secret>,
    current_dir: Option<PathBuf>,
    expected_exit_code: i32,
    timeout: Option<Duration>,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            stdin: None,
            current_dir: None,
            expected_exit_code: 0,
            timeout: None,
        }
    }

    /// Run a line through `sh -c`.
    pub fn shell(line: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(line)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Arg::Plain(arg.into()));
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args
            .extend(args.into_iter().map(|a| Arg::Plain(a.into())));
        self
    }

    /// An argument that is passed verbatim but shown as `****`.
    pub fn secret_arg(mut self, arg: Secret) -> Self {
        self.args.push(Arg::Secret(arg));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Data written to the tool's stdin. Never displayed.
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(Secret::new(input));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn expect_exit_code(mut self, code: i32) -> Self {
        self.expected_exit_code = code;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments as passed to the tool, secrets included.
    pub fn raw_args(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(Arg::raw)
    }

    pub fn env_vars(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn stdin_data(&self) -> Option<&str> {
        self.stdin.as_ref().map(Secret::expose)
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    pub fn expected_exit_code(&self) -> i32 {
        self.expected_exit_code
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether the output's exit status is the one this command expects.
    pub fn accepts(&self, output: &CommandOutput) -> bool {
        output.exit_code == Some(self.expected_exit_code)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            match arg {
                Arg::Plain(s) if s.contains(char::is_whitespace) => write!(f, " '{}'", s)?,
                Arg::Plain(s) => write!(f, " {}", s)?,
                Arg::Secret(s) => write!(f, " {}", s)?,
            }
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Trimmed stderr, falling back to stdout when stderr is empty.
    pub fn diagnostic(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}
