//! Domain types for the Reaper cleanup engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// One (account, region) pair targeted by a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    pub account: String,
    pub region: String,
}

impl Scope {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.region)
    }
}

/// Unique identity of one resource instance: `(account, region, kind, id)`.
///
/// Stable for the duration of a run; the state store is keyed by this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateKey {
    pub account: String,
    pub region: String,
    pub kind: String,
    pub resource_id: String,
}

impl CandidateKey {
    pub fn new(scope: &Scope, kind: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            account: scope.account.clone(),
            region: scope.region.clone(),
            kind: kind.into(),
            resource_id: resource_id.into(),
        }
    }

    pub fn scope(&self) -> Scope {
        Scope::new(self.account.clone(), self.region.clone())
    }
}

impl fmt::Display for CandidateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.account, self.region, self.kind, self.resource_id
        )
    }
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

/// One discovered cloud resource under consideration for cleanup.
///
/// The lifecycle phase is *not* stored here -- the state store owns it and
/// the orchestrator mutates it only through defined transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceCandidate {
    pub key: CandidateKey,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub age_days: u32,
    /// Why the adapter considers this resource orphaned, free text.
    #[serde(default)]
    pub discovery_reason: String,
}

impl ResourceCandidate {
    /// The resource's `Name` tag when present, otherwise its id. Used for
    /// name-pattern filtering.
    pub fn display_name(&self) -> &str {
        self.tags
            .get("Name")
            .map(String::as_str)
            .unwrap_or(&self.key.resource_id)
    }
}

/// Lifecycle phase of a candidate. Exactly one at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Discovered,
    Protected,
    Quarantined,
    Deleting,
    Deleted,
    Failed,
    Skipped,
}

impl Phase {
    /// Terminal phases end a candidate's lifecycle for the run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Phase::Protected | Phase::Deleted | Phase::Failed | Phase::Skipped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Discovered => "DISCOVERED",
            Phase::Protected => "PROTECTED",
            Phase::Quarantined => "QUARANTINED",
            Phase::Deleting => "DELETING",
            Phase::Deleted => "DELETED",
            Phase::Failed => "FAILED",
            Phase::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Adapter outcomes
// ---------------------------------------------------------------------------

/// Result of a quarantine or delete call.
///
/// Expected remote conditions (throttling, not-found) are encoded here, never
/// raised, so retry policy stays uniform across adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    /// The resource was already gone. Treated as deletion success.
    AlreadyAbsent,
    /// Rate limiting, temporary network fault, or a same-wave sibling still
    /// clearing. Retried up to policy limit.
    TransientFailure(String),
    /// Authorization denied, malformed request. Never retried.
    PermanentFailure(String),
}

impl Outcome {
    pub fn is_transient(&self) -> bool {
        matches!(self, Outcome::TransientFailure(_))
    }
}

/// Decision returned by the filter evaluator between discovery and
/// quarantine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterDecision {
    Allow,
    Exclude,
    Protect,
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Bounded exponential backoff parameters. Immutable; one instance is shared
/// by all executor invocations unless an adapter overrides it.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the capped delay used as symmetric jitter, `0.0..=1.0`.
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter_fraction: 0.25,
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Emitted for every phase transition, consumed by logging/report sinks.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionEvent {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub key: CandidateKey,
    /// `None` for the initial DISCOVERED assignment.
    pub from: Option<Phase>,
    pub to: Phase,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_phases() {
        assert!(Phase::Deleted.is_terminal());
        assert!(Phase::Failed.is_terminal());
        assert!(Phase::Skipped.is_terminal());
        assert!(Phase::Protected.is_terminal());
        assert!(!Phase::Discovered.is_terminal());
        assert!(!Phase::Quarantined.is_terminal());
        assert!(!Phase::Deleting.is_terminal());
    }

    #[test]
    fn candidate_key_display() {
        let scope = Scope::new("123456789012", "us-east-1");
        let key = CandidateKey::new(&scope, "ebs-volume", "vol-0abc");
        assert_eq!(key.to_string(), "123456789012/us-east-1/ebs-volume/vol-0abc");
        assert_eq!(key.scope(), scope);
    }

    #[test]
    fn display_name_prefers_name_tag() {
        let scope = Scope::new("a", "r");
        let mut candidate = ResourceCandidate {
            key: CandidateKey::new(&scope, "ec2-instance", "i-1"),
            tags: BTreeMap::new(),
            age_days: 0,
            discovery_reason: String::new(),
        };
        assert_eq!(candidate.display_name(), "i-1");
        candidate.tags.insert("Name".into(), "web-server".into());
        assert_eq!(candidate.display_name(), "web-server");
    }

    #[test]
    fn phase_serde_uppercase() {
        let json = serde_json::to_string(&Phase::Quarantined).unwrap();
        assert_eq!(json, "\"QUARANTINED\"");
        let back: Phase = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Phase::Quarantined);
    }
}
