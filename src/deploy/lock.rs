// ABOUTME: Deploy lock to prevent concurrent deployments to the same environment.
// ABOUTME: Uses atomic ConfigMap creation in the target namespace with holder info in its data.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use super::{DeployError, Kubectl};
use crate::context::PipelineContext;
use crate::diagnostics::{Diagnostics, Warning};
use crate::process::ProcessRunner;

/// ConfigMap holding the lock in the target namespace.
pub const LOCK_NAME: &str = "kedge-deploy-lock";

/// Information about who holds a deploy lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// Commit being deployed.
    pub commit: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(commit: &str) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            commit: commit.to_string(),
        }
    }

    /// Check if this lock is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }

    /// `--from-literal` arguments for `kubectl create configmap`.
    fn literals(&self) -> Vec<String> {
        vec![
            format!("--from-literal=holder={}", self.holder),
            format!("--from-literal=pid={}", self.pid),
            format!("--from-literal=started_at={}", self.started_at.to_rfc3339()),
            format!("--from-literal=commit={}", self.commit),
        ]
    }

    /// Parse the ConfigMap data written by `literals`.
    fn from_data(data: &BTreeMap<String, String>) -> Option<Self> {
        Some(Self {
            holder: data.get("holder")?.clone(),
            pid: data.get("pid")?.parse().ok()?,
            started_at: DateTime::parse_from_rfc3339(data.get("started_at")?)
                .ok()?
                .with_timezone(&Utc),
            commit: data.get("commit").cloned().unwrap_or_default(),
        })
    }
}

#[derive(Deserialize)]
struct ConfigMap {
    #[serde(default)]
    data: BTreeMap<String, String>,
}

/// A held deploy lock. Release explicitly with `release()`.
pub struct DeployLock<'a, R: ?Sized> {
    runner: &'a R,
    kubectl: Kubectl,
}

impl<R: ?Sized> std::fmt::Debug for DeployLock<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployLock")
            .field("namespace", &self.kubectl.namespace())
            .finish()
    }
}

impl<'a, R: ProcessRunner + ?Sized> DeployLock<'a, R> {
    /// Acquire the lock for the namespace `kubectl` targets.
    ///
    /// ConfigMap creation is atomic, so two pipelines cannot both succeed.
    /// Stale locks (>1 hour) and, with `force`, live locks are broken with a
    /// warning.
    pub async fn acquire(
        runner: &'a R,
        kubectl: &Kubectl,
        ctx: &PipelineContext,
        force: bool,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self, DeployError> {
        let info = LockInfo::new(ctx.commit_sha());

        if Self::try_create(runner, kubectl, &info).await? {
            return Ok(Self {
                runner,
                kubectl: kubectl.clone(),
            });
        }

        match Self::read(runner, kubectl).await? {
            Some(existing) if !force && !existing.is_stale() => {
                return Err(DeployError::LockHeld {
                    holder: existing.holder,
                    pid: existing.pid,
                    commit: existing.commit,
                    started_at: existing.started_at,
                });
            }
            Some(existing) => {
                let why = if force { "Breaking" } else { "Auto-breaking stale" };
                diagnostics.warn(Warning::lock_broken(format!(
                    "{} lock held by {} (pid {}) since {}",
                    why, existing.holder, existing.pid, existing.started_at
                )));
            }
            None => {
                diagnostics.warn(Warning::lock_broken("Lock info corrupted, breaking lock"));
            }
        }

        Self::delete(runner, kubectl).await?;

        if !Self::try_create(runner, kubectl, &info).await? {
            return Err(DeployError::lock_error(
                "lock acquired by another process during break",
            ));
        }

        Ok(Self {
            runner,
            kubectl: kubectl.clone(),
        })
    }

    /// `Ok(false)` when the lock already exists.
    async fn try_create(runner: &R, kubectl: &Kubectl, info: &LockInfo) -> Result<bool, DeployError> {
        let mut args = vec![
            "create".to_string(),
            "configmap".to_string(),
            LOCK_NAME.to_string(),
        ];
        args.extend(info.literals());
        let command = kubectl.namespaced(args);

        let output = runner.run(&command).await?;
        if command.accepts(&output) {
            return Ok(true);
        }

        let diagnostic = output.diagnostic();
        if diagnostic.contains("AlreadyExists") || diagnostic.contains("already exists") {
            Ok(false)
        } else {
            Err(DeployError::lock_error(format!(
                "failed to create lock: {}",
                diagnostic
            )))
        }
    }

    /// Current holder, `None` if the lock data is unreadable.
    async fn read(runner: &R, kubectl: &Kubectl) -> Result<Option<LockInfo>, DeployError> {
        let command = kubectl.namespaced(["get", "configmap", LOCK_NAME, "-o", "json"]);
        let output = runner.run(&command).await?;
        if !command.accepts(&output) {
            return Ok(None);
        }

        Ok(serde_json::from_str::<ConfigMap>(&output.stdout)
            .ok()
            .and_then(|cm| LockInfo::from_data(&cm.data)))
    }

    async fn delete(runner: &R, kubectl: &Kubectl) -> Result<(), DeployError> {
        let command = kubectl.namespaced(["delete", "configmap", LOCK_NAME, "--ignore-not-found"]);
        let output = runner.run(&command).await?;
        if !command.accepts(&output) {
            return Err(DeployError::lock_error(format!(
                "failed to remove lock: {}",
                output.diagnostic()
            )));
        }
        Ok(())
    }

    /// Release the lock.
    pub async fn release(self) -> Result<(), DeployError> {
        tracing::debug!(namespace = self.kubectl.namespace(), "Releasing deploy lock");
        Self::delete(self.runner, &self.kubectl).await
    }
}
