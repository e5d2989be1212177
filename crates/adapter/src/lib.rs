//! Resource adapter contract, registry, and retry execution for Reaper.

pub mod catalog;
pub mod inventory;
pub mod registry;
pub mod retry;

use async_trait::async_trait;
use reaper_core::{Outcome, ReaperResult, ResourceCandidate, RetryPolicy, Scope};

pub use inventory::{Inventory, InventoryAdapter};
pub use registry::Registry;
pub use retry::{RetryExecutor, RetryOutcome};

/// Capability contract every resource kind implements.
///
/// All three operations may perform network calls; none may mutate lifecycle
/// state directly -- the orchestrator does that based on returned outcomes.
/// Expected remote conditions (throttling, not-found) must be encoded as
/// [`Outcome`] values, never surfaced as `Err`.
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// Unique kind identifier, e.g. `"ebs-volume"`.
    fn kind(&self) -> &'static str;

    /// Kinds whose instances must all reach a terminal state before this
    /// kind's deletions may start. Evaluated once at registration.
    fn blocked_by(&self) -> &'static [&'static str] {
        &[]
    }

    /// Lists orphaned candidates in one scope. The sequence is finite;
    /// pagination/continuation is an adapter-internal concern.
    async fn discover(&self, scope: &Scope) -> ReaperResult<Vec<ResourceCandidate>>;

    /// Non-destructive marking action (tagging, stopping). Must be safe to
    /// call twice on the same candidate.
    async fn quarantine(&self, candidate: &ResourceCandidate) -> Outcome;

    /// Destructive. Must treat "already absent" as success, not failure.
    async fn delete(&self, candidate: &ResourceCandidate) -> Outcome;

    /// Per-adapter retry policy override, e.g. stricter throttling handling
    /// for a high-volume API. `None` uses the run-wide policy.
    fn retry_policy(&self) -> Option<RetryPolicy> {
        None
    }
}
