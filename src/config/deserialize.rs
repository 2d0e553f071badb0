// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles non-empty stage lists and cluster auth entries.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::HashSet;

use crate::types::StageName;

pub fn deserialize_stages<'de, D>(deserializer: D) -> Result<NonEmpty<StageName>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let stages: Vec<StageName> = Vec::deserialize(deserializer)?;

    let mut seen = HashSet::new();
    if let Some(dup) = stages.iter().find(|s| !seen.insert(s.as_str())) {
        return Err(serde::de::Error::custom(format!(
            "stage {} is listed twice",
            dup
        )));
    }

    NonEmpty::from_vec(stages).ok_or_else(|| serde::de::Error::custom("at least one stage is required"))
}
