// ABOUTME: ProcessRunner that records commands instead of executing them.
// ABOUTME: Backs --dry-run and lets tests script tool responses by substring match.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

use super::error::{ProcessError, TimeoutSnafu};
use super::{Command, CommandOutput, ProcessRunner};

#[derive(Debug, Clone)]
enum Reply {
    Output(CommandOutput),
    Timeout,
}

#[derive(Debug)]
struct Rule {
    pattern: String,
    reply: Reply,
    /// `None` means the rule never runs out.
    remaining: Option<usize>,
}

/// Records every command and answers from scripted rules.
///
/// Rules match when the command's displayed (redacted) line contains the
/// pattern. One-shot rules are consulted before permanent ones, in the order
/// they were added. Commands nothing matches succeed with empty output.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    commands: Mutex<Vec<Command>>,
    rules: Mutex<Vec<Rule>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner for `--dry-run`: every tool succeeds and rollouts finish immediately.
    pub fn dry_run() -> Self {
        let runner = Self::new();
        runner.respond(
            "rollout status",
            CommandOutput::success("deployment successfully rolled out\n"),
        );
        runner.respond("auth can-i", CommandOutput::success("yes\n"));
        runner
    }

    /// Answer every matching command with `output`.
    pub fn respond(&self, pattern: &str, output: CommandOutput) -> &Self {
        self.push_rule(pattern, Reply::Output(output), None)
    }

    /// Answer the next matching command with `output`.
    pub fn respond_once(&self, pattern: &str, output: CommandOutput) -> &Self {
        self.push_rule(pattern, Reply::Output(output), Some(1))
    }

    /// Make every matching command time out.
    pub fn time_out(&self, pattern: &str) -> &Self {
        self.push_rule(pattern, Reply::Timeout, None)
    }

    fn push_rule(&self, pattern: &str, reply: Reply, remaining: Option<usize>) -> &Self {
        self.rules.lock().push(Rule {
            pattern: pattern.to_string(),
            reply,
            remaining,
        });
        self
    }

    /// Commands run so far, in order.
    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().clone()
    }

    /// Redacted command lines run so far, in order.
    pub fn lines(&self) -> Vec<String> {
        self.commands.lock().iter().map(|c| c.to_string()).collect()
    }

    /// Redacted command lines containing `pattern`.
    pub fn lines_matching(&self, pattern: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| l.contains(pattern))
            .collect()
    }

    fn reply_for(&self, line: &str) -> Option<Reply> {
        let mut rules = self.rules.lock();

        let one_shot = rules
            .iter()
            .position(|r| r.remaining.is_some_and(|n| n > 0) && line.contains(&r.pattern));
        if let Some(idx) = one_shot {
            let rule = &mut rules[idx];
            rule.remaining = rule.remaining.map(|n| n - 1);
            return Some(rule.reply.clone());
        }

        rules
            .iter()
            .find(|r| r.remaining.is_none() && line.contains(&r.pattern))
            .map(|r| r.reply.clone())
    }
}

#[async_trait]
impl ProcessRunner for RecordingRunner {
    async fn run(&self, command: &Command) -> Result<CommandOutput, ProcessError> {
        let line = command.to_string();
        tracing::debug!(command = %line, "recorded");
        self.commands.lock().push(command.clone());

        match self.reply_for(&line) {
            Some(Reply::Output(output)) => Ok(output),
            Some(Reply::Timeout) => TimeoutSnafu {
                program: command.program(),
                timeout: command.timeout_duration().unwrap_or(Duration::ZERO),
            }
            .fail(),
            None => Ok(CommandOutput::success("")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unmatched_commands_succeed() {
        let runner = RecordingRunner::new();
        let output = runner.run(&Command::new("true")).await.unwrap();
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(runner.lines(), vec!["true".to_string()]);
    }

    #[tokio::test]
    async fn one_shot_rules_take_precedence_then_expire() {
        let runner = RecordingRunner::new();
        runner.respond("push", CommandOutput::success("ok"));
        runner.respond_once("push", CommandOutput::failure(1, "flaky"));

        let cmd = Command::new("docker").arg("push");
        assert_eq!(runner.run(&cmd).await.unwrap().exit_code, Some(1));
        assert_eq!(runner.run(&cmd).await.unwrap().exit_code, Some(0));
    }

    #[tokio::test]
    async fn timeout_rule_returns_error() {
        let runner = RecordingRunner::new();
        runner.time_out("rollout");

        let err = runner
            .run(&Command::new("kubectl").arg("rollout"))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
