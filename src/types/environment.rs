// ABOUTME: Deployment environment names.
// ABOUTME: Production is the protected tier that always requires manual approval.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown environment '{0}' (expected development or production)")]
pub struct ParseEnvironmentError(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentName {
    Development,
    Production,
}

impl EnvironmentName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentName::Development => "development",
            EnvironmentName::Production => "production",
        }
    }

    /// Whether deployments need an explicit operator approval.
    pub fn requires_approval(&self) -> bool {
        matches!(self, EnvironmentName::Production)
    }
}

impl fmt::Display for EnvironmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvironmentName {
    type Err = ParseEnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(EnvironmentName::Development),
            "production" | "prod" => Ok(EnvironmentName::Production),
            _ => Err(ParseEnvironmentError(s.to_string())),
        }
    }
}
