// ABOUTME: Configuration types and parsing for kedge.yml.
// ABOUTME: Handles YAML parsing, discovery, validation and pipeline construction.

mod deserialize;
mod env_value;
mod environment;
mod image;
mod init;
mod job;

pub use env_value::{EnvValue, resolve_env_map};
pub use environment::{ClusterAuth, EnvironmentConfig, ManifestSet};
pub use image::{ImageConfig, RetryConfig};
pub use init::{init_config, template_yaml};
pub use job::JobConfig;

use crate::error::{Error, Result};
use crate::pipeline::{JobAction, Pipeline, When};
use crate::types::{EnvironmentName, ResourceName, StageName};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "kedge.yml";
pub const CONFIG_FILENAME_ALT: &str = "kedge.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".kedge/config.yml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub app: ResourceName,

    /// Used when the CI default branch variable is absent.
    #[serde(default = "default_branch")]
    pub default_branch: String,

    #[serde(default)]
    pub image: ImageConfig,

    #[serde(deserialize_with = "deserialize::deserialize_stages")]
    pub stages: NonEmpty<StageName>,

    pub jobs: Vec<JobConfig>,

    #[serde(default)]
    pub environments: BTreeMap<EnvironmentName, EnvironmentConfig>,

    /// Extra variables exported to script jobs.
    #[serde(default)]
    pub variables: HashMap<String, EnvValue>,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_branch() -> String {
    "main".to_string()
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(yaml)?;
        config.base_dir = PathBuf::from(".");
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        config.base_dir = project_dir_for(path);
        Ok(config)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!("Loading configuration from {}", path.display());
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Check cross-references that serde cannot express.
    fn validate(&self) -> Result<()> {
        let pipeline = self.pipeline()?;

        for job in pipeline.jobs() {
            if let JobAction::Deploy(env) = job.action {
                if !self.environments.contains_key(&env) {
                    return Err(Error::InvalidConfig(format!(
                        "job {} deploys to {}, which has no environment section",
                        job.name, env
                    )));
                }
                if env.requires_approval() && job.when != When::Manual {
                    return Err(Error::InvalidConfig(format!(
                        "job {} deploys to {} and must be `when: manual`",
                        job.name, env
                    )));
                }
            }
        }

        Ok(())
    }

    /// Build the validated stage/job graph.
    pub fn pipeline(&self) -> Result<Pipeline> {
        let jobs = self
            .jobs
            .iter()
            .map(JobConfig::to_job)
            .collect::<Result<Vec<_>>>()?;
        Pipeline::new(self.stages.clone(), jobs)
    }

    pub fn environment(&self, name: EnvironmentName) -> Result<&EnvironmentConfig> {
        self.environments
            .get(&name)
            .ok_or_else(|| Error::UnknownEnvironment(name.to_string()))
    }

    /// Resolve a path from the configuration against the project directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// `.kedge/config.yml` lives one level below the project root.
fn project_dir_for(config_path: &Path) -> PathBuf {
    let parent = config_path.parent().unwrap_or(Path::new("."));
    if parent.file_name().is_some_and(|n| n == ".kedge") {
        parent.parent().unwrap_or(Path::new(".")).to_path_buf()
    } else {
        parent.to_path_buf()
    }
}
