//! Lifecycle state tracking, keyed by `(account, region, kind, id)`.
//!
//! Backed by a sharded concurrent map: writers to different keys never block
//! each other, writers to the same key serialize through the entry guard.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reaper_core::{CandidateKey, Phase, ReaperError, ReaperResult};
use serde::{Deserialize, Serialize};

/// Per-candidate lifecycle record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRecord {
    pub phase: Phase,
    /// When the current phase was entered. Not touched by same-phase
    /// re-upserts, so quarantine TTL is measured from the first entry.
    pub entered_at: DateTime<Utc>,
    pub last_error: Option<String>,
    /// Adapter invocations of the most recent retried operation.
    pub attempts: u32,
}

/// Snapshot row used for persistence and reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub key: CandidateKey,
    pub record: StateRecord,
}

/// The only shared mutable structure in a run.
#[derive(Debug, Default)]
pub struct StateStore {
    records: DashMap<CandidateKey, StateRecord>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CandidateKey) -> Option<StateRecord> {
        self.records.get(key).map(|r| r.clone())
    }

    /// Atomic per-key read-modify-write. Returns the previous phase, `None`
    /// if the key was absent.
    ///
    /// A transition into the phase the record is already in keeps
    /// `entered_at` (the no-op re-check case); everything else stamps a
    /// fresh timestamp.
    pub fn transition(
        &self,
        key: &CandidateKey,
        to: Phase,
        last_error: Option<String>,
        attempts: Option<u32>,
    ) -> Option<Phase> {
        match self.records.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                let previous = record.phase;
                if previous != to {
                    record.phase = to;
                    record.entered_at = Utc::now();
                }
                if last_error.is_some() {
                    record.last_error = last_error;
                }
                if let Some(attempts) = attempts {
                    record.attempts = attempts;
                }
                Some(previous)
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(StateRecord {
                    phase: to,
                    entered_at: Utc::now(),
                    last_error,
                    attempts: attempts.unwrap_or(0),
                });
                None
            }
        }
    }

    /// Clones every record matching the filter. Used for reporting and
    /// wave-completion accounting.
    pub fn snapshot<F>(&self, filter: F) -> Vec<SnapshotEntry>
    where
        F: Fn(&CandidateKey, &StateRecord) -> bool,
    {
        let mut entries: Vec<SnapshotEntry> = self
            .records
            .iter()
            .filter(|r| filter(r.key(), r.value()))
            .map(|r| SnapshotEntry {
                key: r.key().clone(),
                record: r.value().clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    pub fn all(&self) -> Vec<SnapshotEntry> {
        self.snapshot(|_, _| true)
    }

    /// Seeds the store from a prior run's snapshot for idempotent re-entry.
    pub fn load(&self, entries: Vec<SnapshotEntry>) {
        for entry in entries {
            self.records.insert(entry.key, entry.record);
        }
    }

    pub fn to_json(&self) -> ReaperResult<String> {
        serde_json::to_string_pretty(&self.all())
            .map_err(|e| ReaperError::State(format!("snapshot serialization failed: {e}")))
    }

    pub fn from_json(text: &str) -> ReaperResult<Self> {
        let entries: Vec<SnapshotEntry> = serde_json::from_str(text)
            .map_err(|e| ReaperError::State(format!("snapshot parse failed: {e}")))?;
        let store = Self::new();
        store.load(entries);
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
