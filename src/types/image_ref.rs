// ABOUTME: Container image reference parsing and validation.
// ABOUTME: Handles formats like app, group/app:tag, registry:5000/group/app:tag@digest.

use std::fmt;
use thiserror::Error;

use super::ImageTag;

#[derive(Debug, Error)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0}")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),
}

/// Image coordinates `<registry-host>/<project-path>:<tag>`.
///
/// Unlike `docker pull`, a missing tag is kept as `None` rather than
/// defaulting to `latest`: the publisher decides which tags exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    registry: Option<String>,
    name: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        for c in input.chars() {
            if !c.is_ascii_alphanumeric()
                && c != '/'
                && c != ':'
                && c != '.'
                && c != '-'
                && c != '_'
                && c != '@'
            {
                return Err(ParseImageRefError::InvalidChar(c));
            }
        }

        let (without_digest, digest) = match input.split_once('@') {
            Some((before, after)) => (before, Some(after.to_string())),
            None => (input, None),
        };

        let (without_tag, tag) = match without_digest.rsplit_once(':') {
            // A colon followed by a slash belongs to a registry port
            Some((_, after)) if after.contains('/') => (without_digest, None),
            Some((before, after)) => (before, Some(after.to_string())),
            None => (without_digest, None),
        };

        if without_tag.is_empty()
            || without_tag.ends_with('/')
            || tag.as_deref() == Some("")
            || digest.as_deref() == Some("")
        {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }

        let (registry, name) = Self::parse_registry_and_name(without_tag);

        Ok(Self {
            registry,
            name,
            tag,
            digest,
        })
    }

    fn parse_registry_and_name(input: &str) -> (Option<String>, String) {
        // A registry is present if the first component contains a dot or colon,
        // or is "localhost"
        match input.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (Some(first.to_string()), rest.to_string())
            }
            _ => (None, input.to_string()),
        }
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    /// Repository path below the registry, e.g. `group/app`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Registry and path without tag or digest, e.g. `registry.example.com/group/app`.
    pub fn repository(&self) -> String {
        match &self.registry {
            Some(registry) => format!("{}/{}", registry, self.name),
            None => self.name.clone(),
        }
    }

    /// Same repository with a different tag and no digest.
    pub fn with_tag(&self, tag: &ImageTag) -> Self {
        Self {
            registry: self.registry.clone(),
            name: self.name.clone(),
            tag: Some(tag.to_string()),
            digest: None,
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref registry) = self.registry {
            write!(f, "{}/", registry)?;
        }
        write!(f, "{}", self.name)?;
        if let Some(ref tag) = self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(ref digest) = self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}
