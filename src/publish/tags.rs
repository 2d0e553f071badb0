// ABOUTME: The set of tags one build is pushed under.
// ABOUTME: Always headed by the commit tag, then the ref slug, then `latest` when applicable.

use nonempty::NonEmpty;

use super::PublishError;
use crate::context::PipelineContext;
use crate::types::ImageTag;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSet(NonEmpty<ImageTag>);

impl TagSet {
    /// `[short_sha, ref_slug, latest?]`, without duplicates.
    pub fn for_context(ctx: &PipelineContext) -> Result<Self, PublishError> {
        let mut tags = NonEmpty::new(ctx.commit_tag()?);

        match ImageTag::from_ref_name(ctx.ref_name()) {
            Ok(slug) => push_unique(&mut tags, slug),
            // Refs made only of punctuation slugify to nothing
            Err(e) => tracing::warn!("No branch tag for ref {}: {}", ctx.ref_name(), e),
        }

        if ctx.publishes_latest() {
            push_unique(&mut tags, ImageTag::latest());
        }

        Ok(Self(tags))
    }

    /// The commit tag, which every publish carries.
    pub fn commit(&self) -> &ImageTag {
        self.0.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageTag> {
        self.0.iter()
    }
}

fn push_unique(tags: &mut NonEmpty<ImageTag>, tag: ImageTag) {
    if !tags.contains(&tag) {
        tags.push(tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "abc123def4567890abc123def4567890abc123de";

    fn tags(branch: &str) -> Vec<String> {
        let ctx = PipelineContext::builder(SHA, branch).build().unwrap();
        TagSet::for_context(&ctx)
            .unwrap()
            .iter()
            .map(|t| t.to_string())
            .collect()
    }

    #[test]
    fn default_branch_gets_latest() {
        assert_eq!(tags("main"), vec!["abc123de", "main", "latest"]);
    }

    #[test]
    fn feature_branch_gets_slug_only() {
        assert_eq!(tags("feature/Add-Login"), vec!["abc123de", "feature-add-login"]);
    }

    #[test]
    fn duplicate_slug_is_dropped() {
        assert_eq!(tags("abc123de"), vec!["abc123de"]);
    }

    #[test]
    fn punctuation_ref_keeps_commit_tag() {
        assert_eq!(tags("///"), vec!["abc123de"]);
    }
}
