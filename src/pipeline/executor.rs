// ABOUTME: Job executor backed by real work: scripts, image publishing and deploys.
// ABOUTME: Every external tool runs through the shared ProcessRunner.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use super::{Job, JobAction, JobExecutor};
use crate::config::{Config, resolve_env_map};
use crate::context::PipelineContext;
use crate::deploy::{Approval, DeployOptions, run_deployment};
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::process::{Command, ProcessRunner};
use crate::publish::{ImagePublisher, PublishSettings};
use crate::types::EnvironmentName;

pub struct PipelineExecutor<'a> {
    runner: &'a dyn ProcessRunner,
    config: &'a Config,
    options: DeployOptions,
    diagnostics: Mutex<Diagnostics>,
}

impl<'a> PipelineExecutor<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, config: &'a Config, options: DeployOptions) -> Self {
        Self {
            runner,
            config,
            options,
            diagnostics: Mutex::new(Diagnostics::default()),
        }
    }

    /// Warnings collected by deploy jobs.
    pub fn take_diagnostics(&self) -> Diagnostics {
        std::mem::take(&mut *self.diagnostics.lock())
    }

    async fn script(&self, lines: &[String]) -> Result<()> {
        let variables: BTreeMap<String, String> = resolve_env_map(&self.config.variables)?;

        for line in lines {
            tracing::info!("$ {}", line);
            let command = Command::shell(line.as_str())
                .envs(variables.clone())
                .current_dir(&self.config.base_dir);
            let output = self.runner.run(&command).await?;

            if !output.stdout.is_empty() {
                tracing::debug!("{}", output.stdout.trim_end());
            }
            if !command.accepts(&output) {
                return Err(Error::Script {
                    command: line.clone(),
                    exit_code: output.exit_code,
                    stderr: output.diagnostic().to_string(),
                });
            }
        }
        Ok(())
    }

    async fn publish(&self, ctx: &PipelineContext) -> Result<()> {
        let settings = PublishSettings::from_config(self.config, ctx)?;
        let image = ImagePublisher::new(self.runner, settings).publish(ctx).await?;
        tracing::info!(image = %image.commit_reference(), tags = image.tags.iter().count(), "Image published");
        Ok(())
    }

    async fn deploy(
        &self,
        environment: EnvironmentName,
        ctx: &PipelineContext,
        approval: Option<Approval>,
    ) -> Result<()> {
        let mut diagnostics = Diagnostics::default();
        let result = run_deployment(
            self.runner,
            self.config,
            environment,
            ctx,
            approval,
            self.options,
            &mut diagnostics,
        )
        .await;
        self.diagnostics.lock().extend(diagnostics);

        let outcome = result?;
        tracing::info!(
            environment = %outcome.environment,
            image = %outcome.image,
            "Deployment finished"
        );
        Ok(())
    }
}

#[async_trait]
impl JobExecutor for PipelineExecutor<'_> {
    async fn execute(
        &self,
        job: &Job,
        ctx: &PipelineContext,
        approval: Option<Approval>,
    ) -> Result<()> {
        match &job.action {
            JobAction::Script(lines) => {
                let lines: Vec<String> = lines.iter().cloned().collect();
                self.script(&lines).await
            }
            JobAction::Publish => self.publish(ctx).await,
            JobAction::Deploy(environment) => self.deploy(*environment, ctx, approval).await,
        }
    }
}
