// ABOUTME: kubectl command construction and cluster authentication.
// ABOUTME: Every command is pinned to one kube context and carries a request timeout.

use std::time::Duration;

use super::{DeployError, DeployTarget};
use crate::config::ClusterAuth;
use crate::context::PipelineContext;
use crate::process::{Command, ProcessRunner};
use crate::types::Secret;

/// Slack added to the request timeout for the whole kubectl process.
const PROCESS_GRACE: Duration = Duration::from_secs(20);

/// A kubectl handle bound to one context and namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kubectl {
    context: String,
    namespace: String,
    request_timeout: Duration,
}

impl Kubectl {
    pub fn new(
        context: impl Into<String>,
        namespace: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            context: context.into(),
            namespace: namespace.into(),
            request_timeout,
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// A cluster-scoped command.
    pub fn cluster<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Command::new("kubectl")
            .arg("--context")
            .arg(self.context.as_str())
            .arg(format!(
                "--request-timeout={}s",
                self.request_timeout.as_secs().max(1)
            ))
            .args(args)
            .timeout(self.request_timeout + PROCESS_GRACE)
    }

    /// A command scoped to the target namespace.
    pub fn namespaced<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cluster(args)
            .arg("--namespace")
            .arg(self.namespace.as_str())
    }
}

/// Name of the kube context created for agent credentials.
pub fn agent_context_name(agent_id: u64) -> String {
    format!("kedge-agent-{}", agent_id)
}

/// Agent proxy token: `ci:<agent_id>:<job_token>`.
pub fn agent_token(agent_id: u64, job_token: &Secret) -> Secret {
    Secret::new(format!("ci:{}:{}", agent_id, job_token.expose()))
}

/// Establish credentials for `target` and verify access to its namespace.
pub async fn authenticate<R: ProcessRunner + ?Sized>(
    runner: &R,
    target: &DeployTarget,
    ctx: &PipelineContext,
) -> Result<Kubectl, DeployError> {
    let context = match &target.cluster {
        ClusterAuth::Context(name) => name.clone(),
        ClusterAuth::Agent { id, server } => {
            configure_agent_context(runner, *id, server.as_deref(), ctx).await?
        }
    };

    let kubectl = Kubectl::new(
        context,
        target.namespace.as_str(),
        target.request_timeout,
    );

    // `auth can-i` exits 1 when the answer is "no"
    let check = kubectl.namespaced(["auth", "can-i", "create", "deployments"]);
    let output = runner.run(&check).await?;
    if !check.accepts(&output) {
        let reason = match output.diagnostic() {
            "" | "no" => "access denied".to_string(),
            other => other.to_string(),
        };
        return Err(DeployError::Auth {
            context: kubectl.context().to_string(),
            reason,
        });
    }

    tracing::debug!(context = kubectl.context(), "Cluster access verified");
    Ok(kubectl)
}

/// Write cluster, user and context entries for the agent proxy into the kubeconfig.
async fn configure_agent_context<R: ProcessRunner + ?Sized>(
    runner: &R,
    agent_id: u64,
    server: Option<&str>,
    ctx: &PipelineContext,
) -> Result<String, DeployError> {
    let token = ctx.job_token().ok_or(DeployError::MissingJobToken)?;
    let server = match server {
        Some(server) => server.to_string(),
        None => ctx
            .server_url()
            .map(|url| format!("{}/-/kubernetes-agent/k8s-proxy/", url))
            .ok_or(DeployError::MissingAgentServer(agent_id))?,
    };
    let name = agent_context_name(agent_id);

    let steps = [
        Command::new("kubectl")
            .args(["config", "set-cluster", name.as_str()])
            .arg(format!("--server={}", server)),
        Command::new("kubectl")
            .args(["config", "set-credentials", name.as_str()])
            .secret_arg(Secret::new(format!(
                "--token={}",
                agent_token(agent_id, token).expose()
            ))),
        Command::new("kubectl")
            .args(["config", "set-context", name.as_str()])
            .arg(format!("--cluster={}", name))
            .arg(format!("--user={}", name)),
    ];

    for step in &steps {
        let output = runner.run(step).await?;
        if !step.accepts(&output) {
            return Err(DeployError::Auth {
                context: name.clone(),
                reason: output.diagnostic().to_string(),
            });
        }
    }

    Ok(name)
}
