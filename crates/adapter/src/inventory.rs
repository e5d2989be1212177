//! Inventory-backed adapters.
//!
//! An [`Inventory`] is a declarative YAML list of resources. One
//! [`InventoryAdapter`] per built-in kind serves discovery from it and tracks
//! quarantine marks and deletions in memory. This gives `plan` and dry runs a
//! provider-free path and gives tests a deterministic fixture; real cloud
//! adapters implement the same [`ResourceAdapter`] contract against their
//! provider SDK.

use crate::catalog::{self, KindSpec};
use crate::{Registry, ResourceAdapter};
use async_trait::async_trait;
use reaper_core::{
    CandidateKey, Outcome, ReaperError, ReaperResult, ResourceCandidate, Scope,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One resource row in an inventory file.
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryEntry {
    pub kind: String,
    pub account: String,
    pub region: String,
    pub id: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub age_days: u32,
    #[serde(default)]
    pub reason: String,
}

/// Declarative resource inventory, loaded from YAML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub resources: Vec<InventoryEntry>,
}

impl Inventory {
    pub fn from_yaml(text: &str) -> ReaperResult<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| ReaperError::Config(format!("invalid inventory: {e}")))
    }

    pub fn from_path(path: &Path) -> ReaperResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ReaperError::Config(format!("cannot read inventory {}: {e}", path.display()))
        })?;
        Self::from_yaml(&text)
    }

    /// Builds a registry with one inventory adapter per built-in kind.
    ///
    /// `enabled` limits the registered kinds; `None` or a list containing
    /// `"all"` registers everything. Inventory rows naming a kind outside the
    /// catalog are a configuration error.
    pub fn build_registry(&self, enabled: Option<&[String]>) -> ReaperResult<Registry> {
        for entry in &self.resources {
            if catalog::lookup(&entry.kind).is_none() {
                return Err(ReaperError::Config(format!(
                    "unknown resource kind '{}' in inventory (resource {})",
                    entry.kind, entry.id
                )));
            }
        }

        let want = |kind: &str| match enabled {
            None => true,
            Some(list) => list.iter().any(|k| k == "all" || k == kind),
        };

        let mut registry = Registry::new();
        for spec in catalog::BUILTIN_KINDS {
            if !want(spec.kind) {
                continue;
            }
            let entries: Vec<_> = self
                .resources
                .iter()
                .filter(|e| e.kind == spec.kind)
                .cloned()
                .collect();
            registry.register(Arc::new(InventoryAdapter::new(spec, entries)))?;
        }
        Ok(registry)
    }
}

/// Adapter for one kind over a fixed inventory.
///
/// Quarantine and delete mutate only adapter-internal bookkeeping; both are
/// idempotent per the contract, and deleting an absent resource yields
/// [`Outcome::AlreadyAbsent`].
pub struct InventoryAdapter {
    spec: &'static KindSpec,
    candidates: Vec<ResourceCandidate>,
    quarantined: Mutex<HashSet<CandidateKey>>,
    deleted: Mutex<HashSet<CandidateKey>>,
    destructive_calls: AtomicUsize,
}

impl InventoryAdapter {
    pub fn new(spec: &'static KindSpec, entries: Vec<InventoryEntry>) -> Self {
        let candidates = entries
            .into_iter()
            .map(|e| ResourceCandidate {
                key: CandidateKey {
                    account: e.account,
                    region: e.region,
                    kind: spec.kind.to_string(),
                    resource_id: e.id,
                },
                tags: e.tags,
                age_days: e.age_days,
                discovery_reason: if e.reason.is_empty() {
                    "listed in inventory".to_string()
                } else {
                    e.reason
                },
            })
            .collect();
        Self {
            spec,
            candidates,
            quarantined: Mutex::new(HashSet::new()),
            deleted: Mutex::new(HashSet::new()),
            destructive_calls: AtomicUsize::new(0),
        }
    }

    /// Number of destructive delete calls actually performed.
    pub fn destructive_calls(&self) -> usize {
        self.destructive_calls.load(Ordering::SeqCst)
    }

    pub fn is_deleted(&self, key: &CandidateKey) -> bool {
        self.deleted.lock().expect("deleted set poisoned").contains(key)
    }

    pub fn is_quarantined(&self, key: &CandidateKey) -> bool {
        self.quarantined
            .lock()
            .expect("quarantine set poisoned")
            .contains(key)
    }
}

#[async_trait]
impl ResourceAdapter for InventoryAdapter {
    fn kind(&self) -> &'static str {
        self.spec.kind
    }

    fn blocked_by(&self) -> &'static [&'static str] {
        self.spec.blocked_by
    }

    async fn discover(&self, scope: &Scope) -> ReaperResult<Vec<ResourceCandidate>> {
        let deleted = self.deleted.lock().expect("deleted set poisoned");
        Ok(self
            .candidates
            .iter()
            .filter(|c| {
                c.key.account == scope.account
                    && c.key.region == scope.region
                    && !deleted.contains(&c.key)
            })
            .cloned()
            .collect())
    }

    async fn quarantine(&self, candidate: &ResourceCandidate) -> Outcome {
        if self.is_deleted(&candidate.key) {
            return Outcome::AlreadyAbsent;
        }
        // Re-marking is a no-op, not an error.
        self.quarantined
            .lock()
            .expect("quarantine set poisoned")
            .insert(candidate.key.clone());
        Outcome::Success
    }

    async fn delete(&self, candidate: &ResourceCandidate) -> Outcome {
        let mut deleted = self.deleted.lock().expect("deleted set poisoned");
        if deleted.contains(&candidate.key) {
            return Outcome::AlreadyAbsent;
        }
        self.destructive_calls.fetch_add(1, Ordering::SeqCst);
        deleted.insert(candidate.key.clone());
        Outcome::Success
    }
}
