//! Run summary generation from a state store snapshot.

use crate::state::StateStore;
use reaper_core::Phase;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// Counts per reporting category for one kind (or the run totals).
///
/// `interrupted` covers candidates left in DISCOVERED or DELETING by a
/// cancelled run -- distinct from `failed`. `quarantined` covers candidates
/// still inside their TTL, awaiting a later run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PhaseCounts {
    pub deleted: usize,
    pub failed: usize,
    pub skipped: usize,
    pub protected: usize,
    pub quarantined: usize,
    pub interrupted: usize,
}

impl PhaseCounts {
    fn bump(&mut self, phase: Phase) {
        match phase {
            Phase::Deleted => self.deleted += 1,
            Phase::Failed => self.failed += 1,
            Phase::Skipped => self.skipped += 1,
            Phase::Protected => self.protected += 1,
            Phase::Quarantined => self.quarantined += 1,
            Phase::Discovered | Phase::Deleting => self.interrupted += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.deleted + self.failed + self.skipped + self.protected + self.quarantined
            + self.interrupted
    }
}

/// Always produced, even on partial failure; the CLI derives its exit code
/// from [`RunSummary::has_failures`].
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub per_kind: BTreeMap<String, PhaseCounts>,
    pub totals: PhaseCounts,
    pub discovery_errors: usize,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.totals.failed > 0 || self.discovery_errors > 0
    }

    /// Renders the boxed text report.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push('\n');
        out.push_str("╔══════════════════════════════════════════════════════════════╗\n");
        out.push_str("║                     REAPER RUN SUMMARY                       ║\n");
        out.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        out.push_str(&format!("║  Run:                {:>38} ║\n", self.run_id.to_string()));
        out.push_str(&format!("║  Candidates:         {:>38} ║\n", self.totals.total()));
        out.push_str(&format!("║  Deleted:            {:>38} ║\n", self.totals.deleted));
        out.push_str(&format!("║  Failed:             {:>38} ║\n", self.totals.failed));
        out.push_str(&format!("║  Protected:          {:>38} ║\n", self.totals.protected));
        out.push_str(&format!("║  Skipped:            {:>38} ║\n", self.totals.skipped));
        out.push_str(&format!("║  Quarantined:        {:>38} ║\n", self.totals.quarantined));
        out.push_str(&format!("║  Interrupted:        {:>38} ║\n", self.totals.interrupted));
        out.push_str(&format!("║  Discovery errors:   {:>38} ║\n", self.discovery_errors));
        out.push_str(&format!("║  Elapsed:            {:>36}ms ║\n", self.elapsed_ms));
        if self.cancelled {
            out.push_str("║  RUN CANCELLED: remaining candidates left untouched          ║\n");
        }
        out.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        if self.per_kind.is_empty() {
            out.push_str("║  Nothing discovered.                                         ║\n");
        } else {
            for (kind, counts) in &self.per_kind {
                out.push_str(&format!(
                    "║  {kind:<20} del {:>4}  fail {:>4}  prot {:>4}  skip {:>4} ║\n",
                    counts.deleted, counts.failed, counts.protected, counts.skipped
                ));
            }
        }
        out.push_str("╚══════════════════════════════════════════════════════════════╝\n");
        out
    }
}

/// Builds the summary from the store. Non-settled phases are reported as
/// interrupted: they remain after cancellation, a crash, or a dry run over a
/// snapshot holding an in-flight delete.
pub fn summarize(
    run_id: Uuid,
    store: &StateStore,
    discovery_errors: usize,
    cancelled: bool,
    elapsed: Duration,
) -> RunSummary {
    let mut per_kind: BTreeMap<String, PhaseCounts> = BTreeMap::new();
    let mut totals = PhaseCounts::default();

    for entry in store.all() {
        per_kind
            .entry(entry.key.kind.clone())
            .or_default()
            .bump(entry.record.phase);
        totals.bump(entry.record.phase);
    }

    RunSummary {
        run_id,
        per_kind,
        totals,
        discovery_errors,
        cancelled,
        elapsed_ms: elapsed.as_millis() as u64,
    }
}
