// ABOUTME: Operator approval token required to deploy to protected environments.
// ABOUTME: Only granted from an explicit per-invocation operator action.

use std::fmt;

/// Proof that an operator approved this run by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approval {
    subject: String,
}

impl Approval {
    /// Record an approval for the named job or environment.
    pub fn granted(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }
}

impl fmt::Display for Approval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "approved: {}", self.subject)
    }
}
