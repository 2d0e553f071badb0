// ABOUTME: Image publisher: registry login, one build under every tag, retried pushes.
// ABOUTME: Work is delegated to the docker or podman CLI through a ProcessRunner.

mod error;
mod publisher;
mod retry;
mod tags;

pub use error::PublishError;
pub use publisher::{ImagePublisher, PublishSettings, PublishedImage, commit_image};
pub use retry::RetryPolicy;
pub use tags::TagSet;

use serde::Deserialize;

/// CLI used to build and push images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Builder {
    #[default]
    Docker,
    Podman,
}

impl Builder {
    pub fn program(&self) -> &'static str {
        match self {
            Builder::Docker => "docker",
            Builder::Podman => "podman",
        }
    }
}
