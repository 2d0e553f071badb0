// ABOUTME: Manifest templates and image placeholder substitution.
// ABOUTME: Every manifest is rendered before the first one is applied.

use std::fmt;
use std::path::{Path, PathBuf};

use super::DeployError;
use crate::types::ImageRef;

pub const IMAGE_NAME_PLACEHOLDER: &str = "__IMAGE_NAME_PLACEHOLDER__";
pub const IMAGE_TAG_PLACEHOLDER: &str = "__IMAGE_TAG_PLACEHOLDER__";

const PLACEHOLDER_SUFFIX: &str = "_PLACEHOLDER__";

/// The manifest kinds applied on every deploy, in apply order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ManifestKind {
    Deployment,
    Service,
    Ingress,
}

impl ManifestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestKind::Deployment => "deployment",
            ManifestKind::Service => "service",
            ManifestKind::Ingress => "ingress",
        }
    }

    /// Only the deployment must reference the image.
    fn requires_image(&self) -> bool {
        matches!(self, ManifestKind::Deployment)
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A manifest with image coordinates substituted, ready for `kubectl apply`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedManifest {
    pub kind: ManifestKind,
    pub source: PathBuf,
    pub content: String,
}

/// Substitute the image placeholders in one template.
pub fn render(
    kind: ManifestKind,
    source: &Path,
    template: &str,
    image: &ImageRef,
) -> Result<RenderedManifest, DeployError> {
    let tag = image
        .tag()
        .ok_or_else(|| DeployError::UntaggedImage(image.to_string()))?;

    if kind.requires_image() {
        for placeholder in [IMAGE_NAME_PLACEHOLDER, IMAGE_TAG_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(DeployError::MissingPlaceholder {
                    kind,
                    path: source.to_path_buf(),
                    placeholder,
                });
            }
        }
    }

    let content = template
        .replace(IMAGE_NAME_PLACEHOLDER, &image.repository())
        .replace(IMAGE_TAG_PLACEHOLDER, tag);

    if let Some(token) = leftover_placeholder(&content) {
        return Err(DeployError::UnresolvedPlaceholder {
            kind,
            path: source.to_path_buf(),
            token,
        });
    }

    Ok(RenderedManifest {
        kind,
        source: source.to_path_buf(),
        content,
    })
}

/// Read and render every manifest, failing before anything reaches the cluster.
pub fn render_all(
    manifests: &[(ManifestKind, PathBuf)],
    image: &ImageRef,
) -> Result<Vec<RenderedManifest>, DeployError> {
    manifests
        .iter()
        .map(|(kind, path)| {
            let template =
                std::fs::read_to_string(path).map_err(|source| DeployError::ManifestRead {
                    path: path.clone(),
                    source,
                })?;
            render(*kind, path, &template, image)
        })
        .collect()
}

/// First `__SOMETHING_PLACEHOLDER__` token still present.
fn leftover_placeholder(content: &str) -> Option<String> {
    let suffix_at = content.find(PLACEHOLDER_SUFFIX)?;
    let end = suffix_at + PLACEHOLDER_SUFFIX.len();
    let start = content[..suffix_at]
        .char_indices()
        .rev()
        .take_while(|&(_, c)| is_token_char(c))
        .last()
        .map_or(suffix_at, |(i, _)| i);
    Some(content[start..end].to_string())
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'
}
