//! Deletion-order resolution over declared `blocked_by` constraints.
//!
//! Kahn's algorithm, extracted wave by wave: every kind whose blockers have
//! all been emitted joins the next wave. A nonzero-in-degree residue means a
//! cycle; the run must abort before any destructive action rather than fall
//! back to a partial order, since an undetected cyclic constraint risks
//! deleting a blocking resource prematurely.

use reaper_adapter::Registry;
use reaper_core::{ReaperError, ReaperResult};
use std::collections::{BTreeMap, BTreeSet};

/// An ordered batch of kinds with no unresolved blockers. Kinds within a
/// wave carry no mutual ordering and may be processed concurrently.
pub type Wave = Vec<String>;

/// Builds a directed graph over resource kinds and produces the wave list.
///
/// Runs exactly once per run; the output is immutable input to the
/// orchestrator.
#[derive(Debug, Default)]
pub struct DependencyResolver {
    // kind -> set of blockers. Blockers named here are always nodes too.
    blockers: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the graph from every registered adapter's declaration.
    ///
    /// A blocker naming an unregistered kind is dropped with a warning: an
    /// absent adapter cannot produce work this run, so it cannot be waited
    /// on either.
    pub fn from_registry(registry: &Registry) -> Self {
        let mut resolver = Self::new();
        for adapter in registry.adapters() {
            let declared: Vec<&str> = adapter
                .blocked_by()
                .iter()
                .copied()
                .filter(|blocker| {
                    let known = registry.get(blocker).is_some();
                    if !known {
                        tracing::warn!(
                            kind = adapter.kind(),
                            blocker,
                            "ignoring blocked_by on unregistered kind"
                        );
                    }
                    known
                })
                .collect();
            resolver.add_node(adapter.kind(), &declared);
        }
        resolver
    }

    /// Adds a kind and its blockers. Blockers become nodes implicitly.
    pub fn add_node(&mut self, kind: &str, blocked_by: &[&str]) {
        let entry = self.blockers.entry(kind.to_string()).or_default();
        for blocker in blocked_by {
            entry.insert(blocker.to_string());
        }
        let blocked_by: Vec<String> = blocked_by.iter().map(|s| s.to_string()).collect();
        for blocker in blocked_by {
            self.blockers.entry(blocker).or_default();
        }
    }

    /// Kahn's algorithm by waves. Deterministic: each wave is sorted.
    ///
    /// On a cycle, returns [`ReaperError::CycleDetected`] naming exactly the
    /// residual (unresolvable) kinds; no wave list is produced.
    pub fn resolve(&self) -> ReaperResult<Vec<Wave>> {
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for (kind, blockers) in &self.blockers {
            in_degree.entry(kind).or_insert(0);
            for blocker in blockers {
                *in_degree.entry(kind).or_insert(0) += 1;
                dependents.entry(blocker).or_default().push(kind);
            }
        }

        let mut waves = Vec::new();
        let mut emitted = 0usize;

        loop {
            // BTreeMap iteration keeps each wave sorted.
            let ready: Vec<&str> = in_degree
                .iter()
                .filter(|(_, deg)| **deg == 0)
                .map(|(kind, _)| *kind)
                .collect();

            if ready.is_empty() {
                break;
            }

            for kind in &ready {
                in_degree.remove(kind);
                if let Some(deps) = dependents.get(kind) {
                    for dep in deps {
                        if let Some(deg) = in_degree.get_mut(dep) {
                            *deg -= 1;
                        }
                    }
                }
            }

            emitted += ready.len();
            waves.push(ready.into_iter().map(String::from).collect());
        }

        if emitted != self.blockers.len() {
            let residual: Vec<String> = in_degree.keys().map(|k| k.to_string()).collect();
            return Err(ReaperError::CycleDetected(residual));
        }

        Ok(waves)
    }

    pub fn len(&self) -> usize {
        self.blockers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blockers.is_empty()
    }
}
