// ABOUTME: Gating predicates that decide whether a job runs for a commit event.
// ABOUTME: A job's rules are OR-combined; each rule tests one branch, event or tag condition.

use serde::Deserialize;
use std::fmt;

use crate::context::{PipelineContext, PipelineSource};

/// A single gating condition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RuleEntry")]
pub enum Rule {
    /// The ref is a branch with exactly this name.
    Branch(String),
    /// The ref is the repository's default branch.
    DefaultBranch,
    /// The pipeline was triggered by this source.
    Event(PipelineSource),
    /// The ref is a git tag.
    Tag,
}

impl Rule {
    pub fn matches(&self, ctx: &PipelineContext) -> bool {
        match self {
            Rule::Branch(name) => ctx.branch() == Some(name.as_str()),
            Rule::DefaultBranch => ctx.is_default_branch(),
            Rule::Event(source) => ctx.source() == *source,
            Rule::Tag => ctx.is_tag(),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Branch(name) => write!(f, "branch == {}", name),
            Rule::DefaultBranch => write!(f, "branch == default"),
            Rule::Event(source) => write!(f, "event == {}", source),
            Rule::Tag => write!(f, "tag"),
        }
    }
}

/// Whether any rule matches; an empty rule list always matches.
pub fn any_match(rules: &[Rule], ctx: &PipelineContext) -> bool {
    rules.is_empty() || rules.iter().any(|r| r.matches(ctx))
}

/// Rule as written in YAML: a map with exactly one condition key.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleEntry {
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    default_branch: bool,
    #[serde(default)]
    event: Option<PipelineSource>,
    #[serde(default)]
    tag: bool,
}

impl TryFrom<RuleEntry> for Rule {
    type Error = String;

    fn try_from(entry: RuleEntry) -> Result<Self, Self::Error> {
        let mut rules = Vec::new();
        if let Some(branch) = entry.branch {
            rules.push(Rule::Branch(branch));
        }
        if entry.default_branch {
            rules.push(Rule::DefaultBranch);
        }
        if let Some(source) = entry.event {
            rules.push(Rule::Event(source));
        }
        if entry.tag {
            rules.push(Rule::Tag);
        }

        match rules.len() {
            1 => Ok(rules.remove(0)),
            0 => Err("rule needs one of `branch`, `default_branch`, `event`, `tag`".to_string()),
            _ => Err("rule sets more than one condition; use separate rules".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "0123456789abcdef0123456789abcdef01234567";

    fn branch(name: &str) -> PipelineContext {
        PipelineContext::builder(SHA, name).build().unwrap()
    }

    #[test]
    fn branch_rule_matches_exact_name() {
        let rule = Rule::Branch("development".to_string());
        assert!(rule.matches(&branch("development")));
        assert!(!rule.matches(&branch("development-2")));
    }

    #[test]
    fn branch_rule_ignores_tags_with_same_name() {
        let ctx = PipelineContext::builder(SHA, "production")
            .tag(true)
            .build()
            .unwrap();
        assert!(!Rule::Branch("production".to_string()).matches(&ctx));
        assert!(Rule::Tag.matches(&ctx));
    }

    #[test]
    fn default_branch_follows_context() {
        let ctx = PipelineContext::builder(SHA, "trunk")
            .default_branch("trunk")
            .build()
            .unwrap();
        assert!(Rule::DefaultBranch.matches(&ctx));
        assert!(!Rule::DefaultBranch.matches(&branch("main-old")));
    }

    #[test]
    fn empty_rules_always_match() {
        assert!(any_match(&[], &branch("anything")));
    }

    #[test]
    fn yaml_rule_needs_exactly_one_condition() {
        let parsed: Result<Vec<Rule>, _> =
            serde_yaml::from_str("- branch: main\n  tag: true\n");
        assert!(parsed.is_err());

        let parsed: Vec<Rule> =
            serde_yaml::from_str("- event: merge_request_event\n- default_branch: true\n").unwrap();
        assert_eq!(
            parsed,
            vec![
                Rule::Event(PipelineSource::MergeRequestEvent),
                Rule::DefaultBranch
            ]
        );
    }
}
