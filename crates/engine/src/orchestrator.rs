//! The scheduling core: drives discovered candidates through the lifecycle
//! state machine in dependency order.
//!
//! Waves run strictly in sequence; within a wave, one worker per
//! (kind x scope) fans out candidates under a per-kind concurrency limit and
//! a global service cap. All lifecycle mutation goes through the state
//! store's atomic per-key upsert; the registry and the resolved wave list
//! are read-only after startup.

use crate::event::EventSink;
use crate::filter::FilterEvaluator;
use crate::reporter::{self, RunSummary};
use crate::resolver::DependencyResolver;
use crate::state::StateStore;
use chrono::Utc;
use reaper_adapter::{Registry, ResourceAdapter, RetryExecutor, RetryOutcome};
use reaper_core::{
    CandidateKey, FilterDecision, Phase, ReaperResult, ResourceCandidate, RetryPolicy, Scope,
    TransitionEvent,
};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Run-wide knobs supplied by the configuration layer.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// (account, region) pairs to sweep.
    pub scopes: Vec<Scope>,
    /// Minimum dwell time in QUARANTINED before deletion. Zero means
    /// immediate deletion on the same pass.
    pub quarantine_ttl: Duration,
    /// When set, nothing is mutated; passing candidates are reported as
    /// skipped with a dry-run reason.
    pub dry_run: bool,
    /// Max concurrent candidates per resource kind.
    pub per_kind_concurrency: usize,
    /// Global cap on in-flight adapter calls across all kinds and scopes.
    pub service_cap: usize,
    pub retry: RetryPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            scopes: Vec::new(),
            quarantine_ttl: Duration::ZERO,
            dry_run: true,
            per_kind_concurrency: 8,
            service_cap: 32,
            retry: RetryPolicy::default(),
        }
    }
}

/// The lifecycle scheduler. Construct once per run.
pub struct Orchestrator {
    registry: Arc<Registry>,
    store: Arc<StateStore>,
    filter: Arc<dyn FilterEvaluator>,
    sink: Arc<dyn EventSink>,
    config: RunConfig,
    cancel: CancellationToken,
    run_id: Uuid,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<Registry>,
        store: Arc<StateStore>,
        filter: Arc<dyn FilterEvaluator>,
        sink: Arc<dyn EventSink>,
        config: RunConfig,
    ) -> Self {
        Self {
            registry,
            store,
            filter,
            sink,
            config,
            cancel: CancellationToken::new(),
            run_id: Uuid::new_v4(),
        }
    }

    /// Clone of the run-scoped cancellation signal, for signal handlers.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Executes the full run: resolve waves, then drive every candidate to a
    /// settled state wave by wave. A dependency cycle aborts before any
    /// adapter is invoked.
    pub async fn run(&self) -> ReaperResult<RunSummary> {
        let started = Instant::now();

        let waves = DependencyResolver::from_registry(&self.registry).resolve()?;
        tracing::info!(
            run_id = %self.run_id,
            waves = waves.len(),
            kinds = self.registry.len(),
            scopes = self.config.scopes.len(),
            dry_run = self.config.dry_run,
            "resolved deletion order"
        );

        let service_cap = Arc::new(Semaphore::new(self.config.service_cap.max(1)));
        let discovery_errors = Arc::new(AtomicUsize::new(0));

        for (index, wave) in waves.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(run_id = %self.run_id, wave = index, "run cancelled, skipping remaining waves");
                break;
            }
            tracing::info!(run_id = %self.run_id, wave = index, kinds = ?wave, "starting wave");

            let mut tasks = JoinSet::new();
            for kind in wave {
                let Some(adapter) = self.registry.get(kind) else {
                    continue;
                };
                let policy = adapter
                    .retry_policy()
                    .unwrap_or_else(|| self.config.retry.clone());
                let kind_limit =
                    Arc::new(Semaphore::new(self.config.per_kind_concurrency.max(1)));

                for scope in &self.config.scopes {
                    let worker = Arc::new(Worker {
                        adapter: adapter.clone(),
                        scope: scope.clone(),
                        store: self.store.clone(),
                        filter: self.filter.clone(),
                        sink: self.sink.clone(),
                        cancel: self.cancel.clone(),
                        executor: RetryExecutor::new(policy.clone()),
                        kind_limit: kind_limit.clone(),
                        service_cap: service_cap.clone(),
                        discovery_errors: discovery_errors.clone(),
                        quarantine_ttl: self.config.quarantine_ttl,
                        dry_run: self.config.dry_run,
                        run_id: self.run_id,
                    });
                    tasks.spawn(worker.run());
                }
            }

            // Wave barrier: nothing in the next wave starts until every
            // candidate here is settled.
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    tracing::error!(run_id = %self.run_id, wave = index, error = %e, "worker task panicked");
                }
            }
            tracing::info!(run_id = %self.run_id, wave = index, "wave complete");
        }

        let summary = reporter::summarize(
            self.run_id,
            &self.store,
            discovery_errors.load(Ordering::SeqCst),
            self.cancel.is_cancelled(),
            started.elapsed(),
        );
        tracing::info!(
            run_id = %self.run_id,
            deleted = summary.totals.deleted,
            failed = summary.totals.failed,
            elapsed_ms = summary.elapsed_ms,
            "run complete"
        );
        Ok(summary)
    }
}

/// One (kind x scope) worker: discovers candidates and fans them out.
struct Worker {
    adapter: Arc<dyn ResourceAdapter>,
    scope: Scope,
    store: Arc<StateStore>,
    filter: Arc<dyn FilterEvaluator>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    executor: RetryExecutor,
    kind_limit: Arc<Semaphore>,
    service_cap: Arc<Semaphore>,
    discovery_errors: Arc<AtomicUsize>,
    quarantine_ttl: Duration,
    dry_run: bool,
    run_id: Uuid,
}

impl Worker {
    async fn run(self: Arc<Self>) {
        if self.cancel.is_cancelled() {
            return;
        }

        let candidates = {
            let _permit = self
                .service_cap
                .acquire()
                .await
                .expect("service cap semaphore closed");
            match self.adapter.discover(&self.scope).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    tracing::warn!(
                        kind = self.adapter.kind(),
                        scope = %self.scope,
                        error = %e,
                        "discovery failed"
                    );
                    self.discovery_errors.fetch_add(1, Ordering::SeqCst);
                    return;
                }
            }
        };
        tracing::debug!(
            kind = self.adapter.kind(),
            scope = %self.scope,
            candidates = candidates.len(),
            "discovery complete"
        );

        let mut tasks = JoinSet::new();
        for candidate in candidates {
            let worker = self.clone();
            tasks.spawn(async move {
                let _permit = worker
                    .kind_limit
                    .acquire()
                    .await
                    .expect("kind semaphore closed");
                worker.process(candidate).await;
            });
        }
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(
                    kind = self.adapter.kind(),
                    scope = %self.scope,
                    error = %e,
                    "candidate task panicked"
                );
            }
        }
    }

    /// Drives one candidate from discovery to a settled state: terminal, or
    /// quarantined within its TTL.
    async fn process(&self, candidate: ResourceCandidate) {
        let key = candidate.key.clone();

        // Re-entrancy after a prior run: terminal candidates are skipped
        // without touching the adapter; an aborted DELETING resumes at the
        // delete step; an existing QUARANTINED re-enters the TTL check.
        if let Some(record) = self.store.get(&key) {
            match record.phase {
                phase if phase.is_terminal() => {
                    tracing::debug!(key = %key, phase = %phase, "already settled, skipping");
                    return;
                }
                Phase::Deleting => {
                    self.delete(&candidate, "resuming interrupted delete").await;
                    return;
                }
                Phase::Quarantined => {
                    self.maybe_delete(&candidate).await;
                    return;
                }
                Phase::Discovered => {}
                // Unreachable by construction but harmless to fall through.
                _ => {}
            }
        }

        self.apply(&key, None, Phase::Discovered, &candidate.discovery_reason, None);
        if self.cancel.is_cancelled() {
            return;
        }

        match self.filter.evaluate(&candidate) {
            FilterDecision::Exclude => {
                self.apply(&key, None, Phase::Skipped, "excluded by filter rules", None);
            }
            FilterDecision::Protect => {
                self.apply(&key, None, Phase::Protected, "matched protect rule", None);
            }
            FilterDecision::Allow => {
                if self.dry_run {
                    self.apply(
                        &key,
                        None,
                        Phase::Skipped,
                        "dry-run: would quarantine and delete",
                        None,
                    );
                    return;
                }
                self.quarantine(&candidate).await;
            }
        }
    }

    async fn quarantine(&self, candidate: &ResourceCandidate) {
        let key = &candidate.key;
        if self.cancel.is_cancelled() {
            return;
        }

        let result = self
            .call(&format!("quarantine {key}"), || {
                self.adapter.quarantine(candidate)
            })
            .await;

        match result.outcome {
            reaper_core::Outcome::Success => {
                self.apply(key, Some(result.attempts), Phase::Quarantined, "quarantined", None);
                self.maybe_delete(candidate).await;
            }
            reaper_core::Outcome::AlreadyAbsent => {
                self.apply(key, Some(result.attempts), Phase::Deleted, "already absent", None);
            }
            reaper_core::Outcome::PermanentFailure(reason) => {
                self.apply(
                    key,
                    Some(result.attempts),
                    Phase::Failed,
                    "quarantine failed",
                    Some(reason),
                );
            }
            reaper_core::Outcome::TransientFailure(reason) => {
                if self.cancel.is_cancelled() {
                    // Left non-terminal; reported as interrupted.
                    return;
                }
                self.apply(
                    key,
                    Some(result.attempts),
                    Phase::Failed,
                    "quarantine retries exhausted",
                    Some(reason),
                );
            }
        }
    }

    /// TTL gate between QUARANTINED and DELETING. Re-checks protection so a
    /// resource re-tagged during its grace period survives.
    async fn maybe_delete(&self, candidate: &ResourceCandidate) {
        let key = &candidate.key;
        let Some(record) = self.store.get(key) else {
            return;
        };

        let dwell = Utc::now()
            .signed_duration_since(record.entered_at)
            .to_std()
            .unwrap_or_default();
        if dwell < self.quarantine_ttl {
            tracing::info!(
                key = %key,
                dwell_secs = dwell.as_secs(),
                ttl_secs = self.quarantine_ttl.as_secs(),
                "within quarantine TTL, leaving quarantined"
            );
            return;
        }

        if self.filter.evaluate(candidate) == FilterDecision::Protect {
            self.apply(key, None, Phase::Protected, "re-tagged protected during quarantine", None);
            return;
        }

        let reason = if self.quarantine_ttl.is_zero() {
            "no quarantine TTL, deleting immediately"
        } else {
            "quarantine TTL elapsed"
        };
        self.delete(candidate, reason).await;
    }

    async fn delete(&self, candidate: &ResourceCandidate, reason: &str) {
        let key = &candidate.key;
        if self.dry_run {
            tracing::info!(key = %key, "dry-run: would delete");
            return;
        }
        if self.cancel.is_cancelled() {
            return;
        }

        self.apply(key, None, Phase::Deleting, reason, None);

        let result = self
            .call(&format!("delete {key}"), || self.adapter.delete(candidate))
            .await;

        match result.outcome {
            reaper_core::Outcome::Success => {
                self.apply(key, Some(result.attempts), Phase::Deleted, "deleted", None);
            }
            reaper_core::Outcome::AlreadyAbsent => {
                self.apply(key, Some(result.attempts), Phase::Deleted, "already absent", None);
            }
            reaper_core::Outcome::PermanentFailure(reason) => {
                self.apply(
                    key,
                    Some(result.attempts),
                    Phase::Failed,
                    "delete failed",
                    Some(reason),
                );
            }
            reaper_core::Outcome::TransientFailure(reason) => {
                if self.cancel.is_cancelled() {
                    // Left in DELETING; a later run resumes the delete step.
                    return;
                }
                self.apply(
                    key,
                    Some(result.attempts),
                    Phase::Failed,
                    "delete retries exhausted",
                    Some(reason),
                );
            }
        }
    }

    /// One retried adapter call under the global service cap.
    async fn call<F, Fut>(&self, description: &str, op: F) -> RetryOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = reaper_core::Outcome>,
    {
        let _permit = self
            .service_cap
            .acquire()
            .await
            .expect("service cap semaphore closed");
        self.executor.execute(&self.cancel, description, op).await
    }

    /// Records a transition and emits the event. Same-phase re-upserts (the
    /// no-op re-check) do not emit.
    fn apply(
        &self,
        key: &CandidateKey,
        attempts: Option<u32>,
        to: Phase,
        reason: &str,
        last_error: Option<String>,
    ) {
        let from = self.store.transition(key, to, last_error, attempts);
        if from == Some(to) {
            return;
        }
        self.sink.emit(&TransitionEvent {
            run_id: self.run_id,
            timestamp: Utc::now(),
            key: key.clone(),
            from,
            to,
            reason: reason.to_string(),
        });
    }
}
