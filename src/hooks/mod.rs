// ABOUTME: Hooks system for deployment lifecycle events.
// ABOUTME: Discovers and executes scripts at pre-deploy, post-deploy, and on-error points.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::process::{Command, ProcessRunner};

/// Upper bound for a single hook script.
const HOOK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Hook execution points in the deployment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// Before any cluster call. Failure aborts the deployment.
    PreDeploy,
    /// After a successful rollout. Failure logs a warning.
    PostDeploy,
    /// After a failed deployment. Failure logs a warning.
    OnError,
}

impl HookPoint {
    pub fn filename(&self) -> &'static str {
        match self {
            HookPoint::PreDeploy => "pre-deploy",
            HookPoint::PostDeploy => "post-deploy",
            HookPoint::OnError => "on-error",
        }
    }

    /// Whether failure at this hook point should abort deployment.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HookPoint::PreDeploy)
    }
}

/// Context passed to hooks via `KEDGE_*` environment variables.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub app: String,
    pub environment: String,
    pub namespace: String,
    pub image: String,
    pub commit: String,
    pub reference: String,
    pub url: Option<String>,
}

impl HookContext {
    pub fn to_env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("KEDGE_APP".to_string(), self.app.clone());
        env.insert("KEDGE_ENVIRONMENT".to_string(), self.environment.clone());
        env.insert("KEDGE_NAMESPACE".to_string(), self.namespace.clone());
        env.insert("KEDGE_IMAGE".to_string(), self.image.clone());
        env.insert("KEDGE_COMMIT".to_string(), self.commit.clone());
        env.insert("KEDGE_REF".to_string(), self.reference.clone());
        if let Some(ref url) = self.url {
            env.insert("KEDGE_URL".to_string(), url.clone());
        }
        env
    }
}

/// Result of running a hook.
#[derive(Debug)]
pub struct HookResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Discovers hooks under `.kedge/hooks` and runs them through a process runner.
pub struct HookRunner<'a, R: ?Sized> {
    runner: &'a R,
    project_dir: PathBuf,
    hooks_dir: PathBuf,
}

impl<'a, R: ProcessRunner + ?Sized> HookRunner<'a, R> {
    pub fn new(runner: &'a R, project_dir: &Path) -> Self {
        Self {
            runner,
            project_dir: project_dir.to_path_buf(),
            hooks_dir: project_dir.join(".kedge").join("hooks"),
        }
    }

    pub fn hook_exists(&self, point: HookPoint) -> bool {
        self.hook_path(point).is_file()
    }

    fn hook_path(&self, point: HookPoint) -> PathBuf {
        self.hooks_dir.join(point.filename())
    }

    /// Run a hook if it exists.
    ///
    /// Returns None if the hook doesn't exist, or Some(HookResult) if it was run.
    pub async fn run(&self, point: HookPoint, context: &HookContext) -> Option<HookResult> {
        let hook_path = self.hook_path(point);
        if !hook_path.is_file() {
            return None;
        }

        tracing::info!("Running {} hook: {}", point.filename(), hook_path.display());

        let command = Command::new(hook_path.to_string_lossy())
            .envs(context.to_env())
            .current_dir(&self.project_dir)
            .timeout(HOOK_TIMEOUT);

        let result = match self.runner.run(&command).await {
            Ok(output) => HookResult {
                success: command.accepts(&output),
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            },
            Err(e) => HookResult {
                success: false,
                exit_code: None,
                stdout: String::new(),
                stderr: e.to_string(),
            },
        };

        if result.success {
            tracing::info!("{} hook completed successfully", point.filename());
        } else {
            tracing::warn!(
                "{} hook failed with exit code {:?}",
                point.filename(),
                result.exit_code
            );
        }

        Some(result)
    }

    /// Run a hook and turn a failed run into `Error::Hook`. Missing hooks pass.
    pub async fn run_checked(&self, point: HookPoint, context: &HookContext) -> Result<()> {
        match self.run(point, context).await {
            Some(result) if !result.success => Err(Error::Hook(format!(
                "{} exited with {:?}: {}",
                point.filename(),
                result.exit_code,
                result.stderr.trim()
            ))),
            _ => Ok(()),
        }
    }
}
