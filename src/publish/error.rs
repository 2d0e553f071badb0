// ABOUTME: Error types for image build and publish operations.
// ABOUTME: Covers registry auth, build and push failures.

use crate::error::ErrorKind;
use crate::process::ProcessError;
use crate::types::{ImageTagError, ParseImageRefError};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Registry rejected the credentials.
    #[error("registry login to {registry} failed: {reason}")]
    Auth { registry: String, reason: String },

    #[error("image build failed: {reason}")]
    Build { reason: String },

    /// Push failed on every attempt.
    #[error("push of {reference} failed after {attempts} attempt(s): {reason}")]
    Push {
        reference: String,
        attempts: u32,
        reason: String,
    },

    #[error("invalid image tag: {0}")]
    InvalidTag(#[from] ImageTagError),

    #[error("image repository unknown: set image.repository or CI_REGISTRY_IMAGE")]
    MissingRepository,

    #[error("invalid image repository: {0}")]
    InvalidRepository(#[from] ParseImageRefError),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl PublishError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PublishError::Auth { .. } => ErrorKind::Auth,
            PublishError::Build { .. } => ErrorKind::Build,
            PublishError::Push { .. } => ErrorKind::Push,
            PublishError::InvalidTag(_)
            | PublishError::MissingRepository
            | PublishError::InvalidRepository(_) => ErrorKind::Config,
            PublishError::Process(_) => ErrorKind::Process,
        }
    }
}
