// ABOUTME: Image build and publish configuration.
// ABOUTME: Dockerfile location, build context, builder tool and push retry policy.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use super::EnvValue;
use crate::publish::Builder;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageConfig {
    /// `<registry-host>/<project-path>`; defaults to the CI registry image.
    #[serde(default)]
    pub repository: Option<String>,

    #[serde(default = "default_dockerfile")]
    pub dockerfile: PathBuf,

    #[serde(default = "default_context")]
    pub context: PathBuf,

    #[serde(default)]
    pub builder: Builder,

    #[serde(default)]
    pub build_args: HashMap<String, EnvValue>,

    #[serde(default = "default_build_timeout", with = "humantime_serde")]
    pub build_timeout: Duration,

    #[serde(default)]
    pub push_retry: RetryConfig,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            repository: None,
            dockerfile: default_dockerfile(),
            context: default_context(),
            builder: Builder::default(),
            build_args: HashMap::new(),
            build_timeout: default_build_timeout(),
            push_retry: RetryConfig::default(),
        }
    }
}

fn default_dockerfile() -> PathBuf {
    PathBuf::from("Dockerfile")
}

fn default_context() -> PathBuf {
    PathBuf::from(".")
}

fn default_build_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

/// Bounded exponential backoff for registry pushes.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,

    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
        }
    }
}

fn default_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}
