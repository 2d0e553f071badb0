// ABOUTME: Builds the application image once and pushes it under its tag set.
// ABOUTME: Login uses --password-stdin so registry secrets never appear in argv.

use chrono::{SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::{Builder, PublishError, RetryPolicy, TagSet};
use crate::config::{Config, resolve_env_map};
use crate::context::PipelineContext;
use crate::error::Result;
use crate::process::{Command, ProcessRunner};
use crate::types::ImageRef;

const LOGIN_TIMEOUT: Duration = Duration::from_secs(120);
const PUSH_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Everything the publisher needs, resolved from config and context.
#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub builder: Builder,
    /// Repository without tag, e.g. `registry.example.com/group/app`.
    pub repository: ImageRef,
    pub dockerfile: PathBuf,
    pub context: PathBuf,
    pub build_args: BTreeMap<String, String>,
    pub build_timeout: Duration,
    pub retry: RetryPolicy,
}

impl PublishSettings {
    pub fn from_config(config: &Config, ctx: &PipelineContext) -> Result<Self> {
        let image = &config.image;

        Ok(Self {
            builder: image.builder,
            repository: repository(config, ctx)?,
            dockerfile: config.resolve_path(&image.dockerfile),
            context: config.resolve_path(&image.context),
            build_args: resolve_env_map(&image.build_args)?,
            build_timeout: image.build_timeout,
            retry: RetryPolicy::from(&image.push_retry),
        })
    }
}

/// Configured repository, falling back to the CI registry image.
fn repository(config: &Config, ctx: &PipelineContext) -> Result<ImageRef> {
    let repository = config
        .image
        .repository
        .as_deref()
        .or(ctx.registry_image())
        .ok_or(PublishError::MissingRepository)?;
    Ok(ImageRef::parse(repository).map_err(PublishError::from)?)
}

/// The image a deployment of this commit runs: repository plus commit tag.
pub fn commit_image(config: &Config, ctx: &PipelineContext) -> Result<ImageRef> {
    let tag = ctx.commit_tag().map_err(PublishError::from)?;
    Ok(repository(config, ctx)?.with_tag(&tag))
}

/// A pushed image: the repository and every tag now pointing at the build.
#[derive(Debug, Clone)]
pub struct PublishedImage {
    pub repository: ImageRef,
    pub tags: TagSet,
}

impl PublishedImage {
    /// The reference deployments use: repository plus commit tag.
    pub fn commit_reference(&self) -> ImageRef {
        self.repository.with_tag(self.tags.commit())
    }

    pub fn references(&self) -> Vec<ImageRef> {
        self.tags
            .iter()
            .map(|tag| self.repository.with_tag(tag))
            .collect()
    }
}

pub struct ImagePublisher<'a, R: ?Sized> {
    runner: &'a R,
    settings: PublishSettings,
}

impl<'a, R: ProcessRunner + ?Sized> ImagePublisher<'a, R> {
    pub fn new(runner: &'a R, settings: PublishSettings) -> Self {
        Self { runner, settings }
    }

    /// Login, build with all tags applied, then push each tag.
    ///
    /// Pushes already completed stay in the registry when a later one fails.
    pub async fn publish(
        &self,
        ctx: &PipelineContext,
    ) -> std::result::Result<PublishedImage, PublishError> {
        let tags = TagSet::for_context(ctx)?;
        tracing::info!(
            repository = %self.settings.repository,
            tags = ?tags.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
            "Publishing image"
        );

        self.login(ctx).await?;
        self.build(ctx, &tags).await?;

        let image = PublishedImage {
            repository: self.settings.repository.clone(),
            tags,
        };
        for reference in image.references() {
            self.push(&reference).await?;
        }

        Ok(image)
    }

    async fn login(&self, ctx: &PipelineContext) -> std::result::Result<(), PublishError> {
        let Some(credentials) = ctx.registry_credentials() else {
            tracing::info!("No registry credentials in context, relying on existing login");
            return Ok(());
        };

        let command = Command::new(self.settings.builder.program())
            .args(["login", "--username", credentials.user.as_str(), "--password-stdin"])
            .arg(credentials.registry.as_str())
            .stdin(credentials.password.expose())
            .timeout(LOGIN_TIMEOUT);

        let output = self.runner.run(&command).await?;
        if !command.accepts(&output) {
            return Err(PublishError::Auth {
                registry: credentials.registry.clone(),
                reason: output.diagnostic().to_string(),
            });
        }
        Ok(())
    }

    /// The build invocation for `tags`.
    pub fn build_command(&self, ctx: &PipelineContext, tags: &TagSet) -> Command {
        let settings = &self.settings;
        let mut command = Command::new(settings.builder.program())
            .arg("build")
            .arg("--file")
            .arg(settings.dockerfile.display().to_string())
            .timeout(settings.build_timeout);

        for tag in tags.iter() {
            command = command
                .arg("--tag")
                .arg(settings.repository.with_tag(tag).to_string());
        }

        command = command
            .arg("--label")
            .arg(format!("org.opencontainers.image.revision={}", ctx.commit_sha()))
            .arg("--label")
            .arg(format!(
                "org.opencontainers.image.created={}",
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        if let (Some(server), Some(project)) = (ctx.server_url(), ctx.project_path()) {
            command = command
                .arg("--label")
                .arg(format!("org.opencontainers.image.source={}/{}", server, project));
        }

        for (key, value) in &settings.build_args {
            command = command.arg("--build-arg").arg(format!("{}={}", key, value));
        }

        command.arg(settings.context.display().to_string())
    }

    async fn build(
        &self,
        ctx: &PipelineContext,
        tags: &TagSet,
    ) -> std::result::Result<(), PublishError> {
        let command = self.build_command(ctx, tags);
        let output = self.runner.run(&command).await?;
        if !command.accepts(&output) {
            return Err(PublishError::Build {
                reason: output.diagnostic().to_string(),
            });
        }
        Ok(())
    }

    async fn push(&self, reference: &ImageRef) -> std::result::Result<(), PublishError> {
        let command = Command::new(self.settings.builder.program())
            .arg("push")
            .arg(reference.to_string())
            .timeout(PUSH_TIMEOUT);
        let command = &command;
        let runner = self.runner;

        let what = format!("push {}", reference);
        self.settings
            .retry
            .retry(&what, |_| async move {
                match runner.run(command).await {
                    Ok(output) if command.accepts(&output) => Ok(()),
                    Ok(output) => Err(output.diagnostic().to_string()),
                    Err(e) => Err(e.to_string()),
                }
            })
            .await
            .map_err(|(reason, attempts)| PublishError::Push {
                reference: reference.to_string(),
                attempts,
                reason,
            })
    }
}
