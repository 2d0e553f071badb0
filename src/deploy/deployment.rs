// ABOUTME: Generic deployment struct parameterized by state marker.
// ABOUTME: Construction checks approval and renders every manifest up front.

use super::manifest::{RenderedManifest, render_all};
use super::state::{
    Authenticated, Initialized, ManifestsApplied, NamespaceEnsured, RolloutComplete,
    RolloutFailed, RolloutInProgress,
};
use super::{Approval, DeployError, DeployTarget, Kubectl, ManifestKind};
use crate::types::ImageRef;
use std::time::Duration;

/// A deployment in progress, parameterized by its current state.
///
/// The state type parameter `S` carries state-specific data (like the
/// authenticated kubectl handle) so that, for example, nothing can be applied
/// before credentials were verified.
#[derive(Debug)]
pub struct Deployment<S> {
    pub(crate) target: DeployTarget,
    pub(crate) image: ImageRef,
    pub(crate) manifests: Vec<RenderedManifest>,
    pub(crate) state: S,
}

impl Deployment<Initialized> {
    /// Start a deployment of `image` to `target`.
    ///
    /// Protected environments refuse to start without an approval. All
    /// manifests are read and rendered here, before any cluster call.
    pub fn prepare(
        target: DeployTarget,
        image: ImageRef,
        approval: Option<Approval>,
    ) -> Result<Self, DeployError> {
        if target.environment.requires_approval() && approval.is_none() {
            return Err(DeployError::ApprovalRequired {
                environment: target.environment,
            });
        }
        if image.tag().is_none() {
            return Err(DeployError::UntaggedImage(image.to_string()));
        }

        let manifests = render_all(&target.manifests, &image)?;

        Ok(Deployment {
            target,
            image,
            manifests,
            state: Initialized { approval },
        })
    }

    pub fn approval(&self) -> Option<&Approval> {
        self.state.approval.as_ref()
    }
}

impl<S> Deployment<S> {
    pub fn target(&self) -> &DeployTarget {
        &self.target
    }

    /// Image reference with the commit tag.
    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    /// Rendered manifests in apply order.
    pub fn manifests(&self) -> &[RenderedManifest] {
        &self.manifests
    }
}

impl Deployment<Authenticated> {
    pub fn kubectl(&self) -> &Kubectl {
        &self.state.kubectl
    }
}

impl Deployment<NamespaceEnsured> {
    pub fn kubectl(&self) -> &Kubectl {
        &self.state.kubectl
    }
}

impl Deployment<ManifestsApplied> {
    pub fn kubectl(&self) -> &Kubectl {
        &self.state.kubectl
    }

    /// Kinds applied, in order.
    pub fn applied(&self) -> &[ManifestKind] {
        &self.state.applied
    }
}

impl Deployment<RolloutInProgress> {
    pub fn kubectl(&self) -> &Kubectl {
        &self.state.kubectl
    }
}

impl Deployment<RolloutComplete> {
    /// Time spent waiting for the rollout.
    pub fn rollout_duration(&self) -> Duration {
        self.state.elapsed
    }
}

impl Deployment<RolloutFailed> {
    pub fn rollout_duration(&self) -> Duration {
        self.state.elapsed
    }
}
