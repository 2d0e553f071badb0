// ABOUTME: Immutable pipeline context built once from CI predefined variables.
// ABOUTME: Components receive it by reference instead of reading the environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::{ImageTag, Secret, slugify};

/// Length of the short commit identifier used as the primary image tag.
pub const SHORT_SHA_LEN: usize = 8;

/// Branches that always publish the `latest` tag, besides the default branch.
const LATEST_BRANCHES: [&str; 2] = ["main", "master"];

#[derive(Debug, thiserror::Error)]
#[error("unknown pipeline source '{0}' (expected push, merge_request_event, web, schedule, trigger, api or pipeline)")]
pub struct ParsePipelineSourceError(String);

/// What triggered the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineSource {
    Push,
    MergeRequestEvent,
    Web,
    Schedule,
    Trigger,
    Api,
    Pipeline,
    Other,
}

impl PipelineSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineSource::Push => "push",
            PipelineSource::MergeRequestEvent => "merge_request_event",
            PipelineSource::Web => "web",
            PipelineSource::Schedule => "schedule",
            PipelineSource::Trigger => "trigger",
            PipelineSource::Api => "api",
            PipelineSource::Pipeline => "pipeline",
            PipelineSource::Other => "other",
        }
    }
}

impl fmt::Display for PipelineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineSource {
    type Err = ParsePipelineSourceError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "push" => Ok(PipelineSource::Push),
            "merge_request_event" | "merge-request" | "mr" => Ok(PipelineSource::MergeRequestEvent),
            "web" => Ok(PipelineSource::Web),
            "schedule" => Ok(PipelineSource::Schedule),
            "trigger" => Ok(PipelineSource::Trigger),
            "api" => Ok(PipelineSource::Api),
            "pipeline" | "parent_pipeline" => Ok(PipelineSource::Pipeline),
            _ => Err(ParsePipelineSourceError(s.to_string())),
        }
    }
}

/// Registry login data.
#[derive(Debug, Clone)]
pub struct RegistryCredentials {
    pub registry: String,
    pub user: String,
    pub password: Secret,
}

/// Everything a pipeline invocation knows about the commit being processed.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    commit_sha: String,
    ref_name: String,
    is_tag: bool,
    source: PipelineSource,
    default_branch: String,
    project_path: Option<String>,
    server_url: Option<String>,
    registry_image: Option<String>,
    registry: Option<RegistryCredentials>,
    job_token: Option<Secret>,
}

/// Values supplied on the command line that win over CI variables.
#[derive(Debug, Clone, Default)]
pub struct ContextOverrides {
    pub sha: Option<String>,
    pub branch: Option<String>,
    pub tag: Option<String>,
    pub source: Option<PipelineSource>,
    pub default_branch: Option<String>,
}

impl PipelineContext {
    pub fn builder(commit_sha: impl Into<String>, ref_name: impl Into<String>) -> ContextBuilder {
        ContextBuilder {
            ctx: PipelineContext {
                commit_sha: commit_sha.into(),
                ref_name: ref_name.into(),
                is_tag: false,
                source: PipelineSource::Push,
                default_branch: "main".to_string(),
                project_path: None,
                server_url: None,
                registry_image: None,
                registry: None,
                job_token: None,
            },
        }
    }

    /// Build the context from the process environment.
    pub fn from_env(overrides: &ContextOverrides, fallback_default_branch: &str) -> Result<Self> {
        Self::from_lookup(
            |key| std::env::var(key).ok().filter(|v| !v.is_empty()),
            overrides,
            fallback_default_branch,
        )
    }

    /// Build the context from an arbitrary variable lookup.
    pub fn from_lookup<F>(
        lookup: F,
        overrides: &ContextOverrides,
        fallback_default_branch: &str,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let sha = overrides
            .sha
            .clone()
            .or_else(|| lookup("CI_COMMIT_SHA"))
            .ok_or(Error::MissingContext("CI_COMMIT_SHA (--sha)"))?;

        let tag = overrides.tag.clone().or_else(|| {
            // An explicit branch on the command line means "not a tag pipeline"
            if overrides.branch.is_some() {
                None
            } else {
                lookup("CI_COMMIT_TAG")
            }
        });

        let source = overrides.source.unwrap_or_else(|| {
            lookup("CI_PIPELINE_SOURCE")
                // CI may report sources newer than this list
                .map(|s| s.parse().unwrap_or(PipelineSource::Other))
                .unwrap_or(PipelineSource::Push)
        });

        let (ref_name, is_tag) = match tag {
            Some(tag) => (tag, true),
            None => {
                let branch = overrides
                    .branch
                    .clone()
                    .or_else(|| {
                        if source == PipelineSource::MergeRequestEvent {
                            lookup("CI_MERGE_REQUEST_SOURCE_BRANCH_NAME")
                        } else {
                            None
                        }
                    })
                    .or_else(|| lookup("CI_COMMIT_BRANCH"))
                    .or_else(|| lookup("CI_COMMIT_REF_NAME"))
                    .ok_or(Error::MissingContext("CI_COMMIT_REF_NAME (--branch)"))?;
                (branch, false)
            }
        };

        let default_branch = overrides
            .default_branch
            .clone()
            .or_else(|| lookup("CI_DEFAULT_BRANCH"))
            .unwrap_or_else(|| fallback_default_branch.to_string());

        let registry = match (
            lookup("CI_REGISTRY"),
            lookup("CI_REGISTRY_USER"),
            lookup("CI_REGISTRY_PASSWORD"),
        ) {
            (Some(registry), Some(user), Some(password)) => Some(RegistryCredentials {
                registry,
                user,
                password: Secret::new(password),
            }),
            _ => None,
        };

        let mut builder = Self::builder(sha, ref_name)
            .tag(is_tag)
            .source(source)
            .default_branch(default_branch);
        if let Some(path) = lookup("CI_PROJECT_PATH") {
            builder = builder.project_path(path);
        }
        if let Some(url) = lookup("CI_SERVER_URL") {
            builder = builder.server_url(url);
        }
        if let Some(image) = lookup("CI_REGISTRY_IMAGE") {
            builder = builder.registry_image(image);
        }
        if let Some(credentials) = registry {
            builder = builder.registry_credentials(credentials);
        }
        if let Some(token) = lookup("CI_JOB_TOKEN") {
            builder = builder.job_token(Secret::new(token));
        }
        builder.build()
    }

    pub fn commit_sha(&self) -> &str {
        &self.commit_sha
    }

    /// First eight characters of the commit SHA.
    pub fn short_sha(&self) -> &str {
        let end = self
            .commit_sha
            .char_indices()
            .nth(SHORT_SHA_LEN)
            .map(|(i, _)| i)
            .unwrap_or(self.commit_sha.len());
        &self.commit_sha[..end]
    }

    /// Branch or tag name.
    pub fn ref_name(&self) -> &str {
        &self.ref_name
    }

    pub fn ref_slug(&self) -> String {
        slugify(&self.ref_name)
    }

    /// Branch name, `None` for tag pipelines.
    pub fn branch(&self) -> Option<&str> {
        if self.is_tag {
            None
        } else {
            Some(&self.ref_name)
        }
    }

    pub fn is_tag(&self) -> bool {
        self.is_tag
    }

    pub fn source(&self) -> PipelineSource {
        self.source
    }

    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    pub fn is_default_branch(&self) -> bool {
        self.branch() == Some(self.default_branch.as_str())
    }

    /// Whether builds of this ref also move the `latest` tag.
    pub fn publishes_latest(&self) -> bool {
        self.is_default_branch()
            || self
                .branch()
                .is_some_and(|b| LATEST_BRANCHES.contains(&b))
    }

    /// The commit tag every published image carries.
    pub fn commit_tag(&self) -> std::result::Result<ImageTag, crate::types::ImageTagError> {
        ImageTag::new(self.short_sha())
    }

    pub fn project_path(&self) -> Option<&str> {
        self.project_path.as_deref()
    }

    pub fn server_url(&self) -> Option<&str> {
        self.server_url.as_deref()
    }

    pub fn registry_image(&self) -> Option<&str> {
        self.registry_image.as_deref()
    }

    pub fn registry_credentials(&self) -> Option<&RegistryCredentials> {
        self.registry.as_ref()
    }

    pub fn job_token(&self) -> Option<&Secret> {
        self.job_token.as_ref()
    }
}

/// Builder for contexts assembled outside CI (tests, command-line overrides).
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    ctx: PipelineContext,
}

impl ContextBuilder {
    pub fn tag(mut self, is_tag: bool) -> Self {
        self.ctx.is_tag = is_tag;
        self
    }

    pub fn source(mut self, source: PipelineSource) -> Self {
        self.ctx.source = source;
        self
    }

    pub fn default_branch(mut self, branch: impl Into<String>) -> Self {
        self.ctx.default_branch = branch.into();
        self
    }

    pub fn project_path(mut self, path: impl Into<String>) -> Self {
        self.ctx.project_path = Some(path.into());
        self
    }

    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.ctx.server_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn registry_image(mut self, image: impl Into<String>) -> Self {
        self.ctx.registry_image = Some(image.into());
        self
    }

    pub fn registry_credentials(mut self, credentials: RegistryCredentials) -> Self {
        self.ctx.registry = Some(credentials);
        self
    }

    pub fn job_token(mut self, token: Secret) -> Self {
        self.ctx.job_token = Some(token);
        self
    }

    pub fn build(self) -> Result<PipelineContext> {
        let ctx = self.ctx;
        if ctx.commit_sha.len() < SHORT_SHA_LEN
            || !ctx.commit_sha.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(Error::InvalidConfig(format!(
                "commit SHA must be at least {} hex characters: {}",
                SHORT_SHA_LEN, ctx.commit_sha
            )));
        }
        if ctx.ref_name.trim().is_empty() {
            return Err(Error::InvalidConfig("ref name cannot be empty".to_string()));
        }
        Ok(ctx)
    }
}
