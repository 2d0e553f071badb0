// ABOUTME: Cluster deployment orchestration using the type state pattern.
// ABOUTME: run_deployment drives one environment from approval check to finished rollout.

mod approval;
mod deployment;
mod error;
mod kubectl;
mod lock;
mod manifest;
mod rollback;
mod state;
mod target;
mod transitions;

pub use approval::Approval;
pub use deployment::Deployment;
pub use error::DeployError;
pub use kubectl::{Kubectl, agent_context_name, authenticate};
pub use lock::{DeployLock, LOCK_NAME, LockInfo};
pub use manifest::{
    IMAGE_NAME_PLACEHOLDER, IMAGE_TAG_PLACEHOLDER, ManifestKind, RenderedManifest, render,
    render_all,
};
pub use rollback::{RolloutStatus, rollback, rollout_history, rollout_status};
pub use state::{
    Authenticated, Initialized, ManifestsApplied, NamespaceEnsured, RolloutComplete,
    RolloutFailed, RolloutInProgress,
};
pub use target::DeployTarget;
pub use transitions::TransitionResult;

use serde::Serialize;
use std::time::Duration;

use crate::config::Config;
use crate::context::PipelineContext;
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::Result;
use crate::hooks::{HookContext, HookPoint, HookRunner};
use crate::process::ProcessRunner;
use crate::publish::commit_image;
use crate::types::{EnvironmentName, ImageRef};

/// Knobs the operator sets per deploy.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Break a live deploy lock instead of refusing.
    pub force_lock: bool,
}

/// A finished, healthy deployment.
#[derive(Debug, Clone, Serialize)]
pub struct DeployOutcome {
    pub environment: EnvironmentName,
    pub namespace: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "rollout_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64((d.as_secs_f64() * 10.0).round() / 10.0)
}

/// Deploy the current commit's image to `environment`.
///
/// Order: render manifests, pre-deploy hook, authenticate, namespace, lock,
/// apply, rollout. The lock is always released once taken. A failed
/// pre-deploy hook aborts before the cluster is touched; post-deploy and
/// on-error hook failures only warn.
pub async fn run_deployment<R: ProcessRunner + ?Sized>(
    runner: &R,
    config: &Config,
    environment: EnvironmentName,
    ctx: &PipelineContext,
    approval: Option<Approval>,
    options: DeployOptions,
    diagnostics: &mut Diagnostics,
) -> Result<DeployOutcome> {
    let target = DeployTarget::from_config(config, environment)?;
    let image = commit_image(config, ctx)?;
    let deployment = Deployment::prepare(target, image, approval)?;

    let hooks = HookRunner::new(runner, &config.base_dir);
    let hook_context = hook_context(config, deployment.target(), deployment.image(), ctx);
    hooks
        .run_checked(HookPoint::PreDeploy, &hook_context)
        .await?;

    let result = drive(runner, deployment, ctx, options, diagnostics).await;

    let (point, outcome) = match result {
        Ok(outcome) => (HookPoint::PostDeploy, Ok(outcome)),
        Err(e) => (HookPoint::OnError, Err(e)),
    };
    if let Err(e) = hooks.run_checked(point, &hook_context).await {
        diagnostics.warn(Warning::hook_failed(e.to_string()));
    }

    Ok(outcome?)
}

async fn drive<R: ProcessRunner + ?Sized>(
    runner: &R,
    deployment: Deployment<Initialized>,
    ctx: &PipelineContext,
    options: DeployOptions,
    diagnostics: &mut Diagnostics,
) -> std::result::Result<DeployOutcome, DeployError> {
    let deployment = deployment.authenticate(runner, ctx).await?;
    let deployment = deployment.ensure_namespace(runner).await?;

    let lock = DeployLock::acquire(
        runner,
        deployment.kubectl(),
        ctx,
        options.force_lock,
        diagnostics,
    )
    .await?;

    let result = apply_and_wait(runner, deployment).await;

    if let Err(e) = lock.release().await {
        tracing::warn!(error = %e, "Failed to release deploy lock");
        diagnostics.warn(Warning::lock_release(e.to_string()));
    }

    result
}

async fn apply_and_wait<R: ProcessRunner + ?Sized>(
    runner: &R,
    deployment: Deployment<NamespaceEnsured>,
) -> std::result::Result<DeployOutcome, DeployError> {
    let deployment = deployment.apply_manifests(runner).await?;
    tracing::debug!(applied = ?deployment.applied(), "Manifests applied");
    let deployment = deployment
        .start_rollout()
        .await_rollout(runner)
        .await
        .map_err(|(_failed, e)| e)?;

    let target = deployment.target();
    Ok(DeployOutcome {
        environment: target.environment,
        namespace: target.namespace.to_string(),
        image: deployment.image().to_string(),
        url: target.url.clone(),
        elapsed: deployment.rollout_duration(),
    })
}

fn hook_context(
    config: &Config,
    target: &DeployTarget,
    image: &ImageRef,
    ctx: &PipelineContext,
) -> HookContext {
    HookContext {
        app: config.app.to_string(),
        environment: target.environment.to_string(),
        namespace: target.namespace.to_string(),
        image: image.to_string(),
        commit: ctx.commit_sha().to_string(),
        reference: ctx.ref_name().to_string(),
        url: target.url.clone(),
    }
}
