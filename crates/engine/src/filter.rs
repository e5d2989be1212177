//! Tag and name-pattern filtering between discovery and quarantine.

use glob::Pattern;
use reaper_core::{FilterDecision, ReaperError, ReaperResult, ResourceCandidate};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Decides a candidate's fate before any mutation happens.
pub trait FilterEvaluator: Send + Sync {
    fn evaluate(&self, candidate: &ResourceCandidate) -> FilterDecision;
}

/// Declarative filter rules, loaded from configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    /// Tag key -> protected values. A match shields the resource from any
    /// mutation for the whole run.
    pub protect_tags: BTreeMap<String, Vec<String>>,
    /// Tag key -> eligible values. When non-empty, a candidate must match at
    /// least one entry or it is excluded.
    pub include_tags: BTreeMap<String, Vec<String>>,
    /// Shell-style name patterns (matched against the Name tag or the id).
    pub exclude_name_patterns: Vec<String>,
    /// Candidates younger than this are excluded.
    pub min_age_days: u32,
}

/// Rule-based [`FilterEvaluator`]. Protection wins over everything else.
pub struct RuleFilter {
    rules: FilterRules,
    exclude_patterns: Vec<Pattern>,
}

impl RuleFilter {
    pub fn new(rules: FilterRules) -> ReaperResult<Self> {
        let exclude_patterns = rules
            .exclude_name_patterns
            .iter()
            .map(|p| {
                Pattern::new(p)
                    .map_err(|e| ReaperError::Config(format!("bad exclude pattern '{p}': {e}")))
            })
            .collect::<ReaperResult<Vec<_>>>()?;
        Ok(Self {
            rules,
            exclude_patterns,
        })
    }

    fn tag_match(rules: &BTreeMap<String, Vec<String>>, tags: &BTreeMap<String, String>) -> bool {
        rules.iter().any(|(key, values)| {
            tags.get(key)
                .map(|v| values.iter().any(|allowed| allowed == v))
                .unwrap_or(false)
        })
    }
}

impl FilterEvaluator for RuleFilter {
    fn evaluate(&self, candidate: &ResourceCandidate) -> FilterDecision {
        if Self::tag_match(&self.rules.protect_tags, &candidate.tags) {
            return FilterDecision::Protect;
        }

        let name = candidate.display_name();
        if self.exclude_patterns.iter().any(|p| p.matches(name)) {
            return FilterDecision::Exclude;
        }

        if !self.rules.include_tags.is_empty()
            && !Self::tag_match(&self.rules.include_tags, &candidate.tags)
        {
            return FilterDecision::Exclude;
        }

        if candidate.age_days < self.rules.min_age_days {
            return FilterDecision::Exclude;
        }

        FilterDecision::Allow
    }
}
