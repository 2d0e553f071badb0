// ABOUTME: Diagnostics accumulator for non-fatal warnings during a pipeline run.
// ABOUTME: Collects warnings that shouldn't fail the pipeline but should be shown to users.

use serde::Serialize;

/// Collects non-fatal warnings during pipeline and deploy operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Move every warning from `other` into this collector.
    pub fn extend(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }
}

/// A non-fatal warning.
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// A job marked `allow_failure` failed.
    pub fn allowed_failure(job: &str, error: impl std::fmt::Display) -> Self {
        Self {
            kind: WarningKind::AllowedFailure,
            message: format!("job {} failed (allowed): {}", job, error),
        }
    }

    /// Create a lock release warning.
    pub fn lock_release(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::LockRelease,
            message: message.into(),
        }
    }

    /// An existing deploy lock was broken (stale or forced).
    pub fn lock_broken(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::LockBroken,
            message: message.into(),
        }
    }

    /// A post-deploy or on-error hook failed.
    pub fn hook_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::HookFailed,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// An allow-failure job failed; the pipeline continued.
    AllowedFailure,
    /// Failed to release deploy lock (lock may remain in the cluster).
    LockRelease,
    /// A stale or forced lock was removed before deploying.
    LockBroken,
    /// Non-blocking hook failure.
    HookFailed,
}
