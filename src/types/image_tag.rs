// ABOUTME: Registry tag validation and ref-name slugification.
// ABOUTME: Slugs follow the CI convention: lowercase alphanumerics and hyphens, at most 63 chars.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

const MAX_TAG_LEN: usize = 128;
const MAX_SLUG_LEN: usize = 63;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageTagError {
    #[error("image tag cannot be empty")]
    Empty,

    #[error("image tag exceeds maximum length of 128 characters")]
    TooLong,

    #[error("image tag cannot start with '{0}'")]
    InvalidStart(char),

    #[error("invalid character in image tag: '{0}'")]
    InvalidChar(char),
}

/// A registry tag: `[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ImageTag(String);

impl ImageTag {
    pub fn new(value: &str) -> Result<Self, ImageTagError> {
        let mut chars = value.chars();
        let first = chars.next().ok_or(ImageTagError::Empty)?;

        if value.len() > MAX_TAG_LEN {
            return Err(ImageTagError::TooLong);
        }

        if !first.is_ascii_alphanumeric() && first != '_' {
            return Err(ImageTagError::InvalidStart(first));
        }

        if let Some(c) = chars.find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '_' | '.' | '-'))
        {
            return Err(ImageTagError::InvalidChar(c));
        }

        Ok(Self(value.to_string()))
    }

    /// The floating tag pushed for default-branch builds.
    pub fn latest() -> Self {
        Self("latest".to_string())
    }

    /// Tag derived from a branch or git tag name.
    pub fn from_ref_name(ref_name: &str) -> Result<Self, ImageTagError> {
        Self::new(&slugify(ref_name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Slugify a ref name: lowercase, replace everything outside `[a-z0-9]`
/// with `-`, truncate to 63 characters and trim hyphens at both ends.
///
/// `feature/Add-Login` becomes `feature-add-login`.
pub fn slugify(ref_name: &str) -> String {
    let replaced: String = ref_name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .take(MAX_SLUG_LEN)
        .collect();

    replaced.trim_matches('-').to_string()
}
