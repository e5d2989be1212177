//! End-to-end lifecycle tests driving the orchestrator over scripted
//! in-memory adapters.

use async_trait::async_trait;
use reaper_adapter::{Registry, ResourceAdapter};
use reaper_core::{
    CandidateKey, Outcome, Phase, ReaperError, ReaperResult, ResourceCandidate, RetryPolicy, Scope,
    TransitionEvent,
};
use reaper_engine::{
    ChannelSink, FilterRules, Orchestrator, RuleFilter, RunConfig, StateStore,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

fn scope() -> Scope {
    Scope::new("123456789012", "us-east-1")
}

fn candidate(kind: &str, id: &str, tags: &[(&str, &str)]) -> ResourceCandidate {
    ResourceCandidate {
        key: CandidateKey::new(&scope(), kind, id),
        tags: tags
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        age_days: 30,
        discovery_reason: "orphaned in test fixture".into(),
    }
}

/// Adapter with scripted delete outcomes and call counters.
struct ScriptedAdapter {
    kind: &'static str,
    blocked_by: &'static [&'static str],
    candidates: Vec<ResourceCandidate>,
    delete_script: Mutex<VecDeque<Outcome>>,
    discover_calls: AtomicUsize,
    quarantine_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    /// Shared cross-adapter log of delete order, by kind.
    delete_log: Option<Arc<Mutex<Vec<&'static str>>>>,
}

impl ScriptedAdapter {
    fn new(kind: &'static str, candidates: Vec<ResourceCandidate>) -> Self {
        Self {
            kind,
            blocked_by: &[],
            candidates,
            delete_script: Mutex::new(VecDeque::new()),
            discover_calls: AtomicUsize::new(0),
            quarantine_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            delete_log: None,
        }
    }

    fn blocked_by(mut self, blockers: &'static [&'static str]) -> Self {
        self.blocked_by = blockers;
        self
    }

    fn script_deletes(self, outcomes: Vec<Outcome>) -> Self {
        *self.delete_script.lock().unwrap() = outcomes.into();
        self
    }

    fn log_deletes_to(mut self, log: Arc<Mutex<Vec<&'static str>>>) -> Self {
        self.delete_log = Some(log);
        self
    }
}

#[async_trait]
impl ResourceAdapter for ScriptedAdapter {
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn blocked_by(&self) -> &'static [&'static str] {
        self.blocked_by
    }

    async fn discover(&self, scope: &Scope) -> ReaperResult<Vec<ResourceCandidate>> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .candidates
            .iter()
            .filter(|c| c.key.account == scope.account && c.key.region == scope.region)
            .cloned()
            .collect())
    }

    async fn quarantine(&self, _candidate: &ResourceCandidate) -> Outcome {
        self.quarantine_calls.fetch_add(1, Ordering::SeqCst);
        Outcome::Success
    }

    async fn delete(&self, _candidate: &ResourceCandidate) -> Outcome {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.delete_log {
            log.lock().unwrap().push(self.kind);
        }
        self.delete_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Success)
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        jitter_fraction: 0.0,
    }
}

fn run_config() -> RunConfig {
    RunConfig {
        scopes: vec![scope()],
        quarantine_ttl: Duration::ZERO,
        dry_run: false,
        per_kind_concurrency: 4,
        service_cap: 16,
        retry: fast_retry(),
    }
}

struct Harness {
    orchestrator: Orchestrator,
    store: Arc<StateStore>,
    events: UnboundedReceiver<TransitionEvent>,
}

fn harness(adapters: Vec<Arc<ScriptedAdapter>>, rules: FilterRules, config: RunConfig) -> Harness {
    let mut registry = Registry::new();
    for adapter in adapters {
        registry.register(adapter).unwrap();
    }
    let store = Arc::new(StateStore::new());
    let (sink, events) = ChannelSink::new();
    let orchestrator = Orchestrator::new(
        Arc::new(registry),
        store.clone(),
        Arc::new(RuleFilter::new(rules).unwrap()),
        Arc::new(sink),
        config,
    );
    Harness {
        orchestrator,
        store,
        events,
    }
}

fn drain(events: &mut UnboundedReceiver<TransitionEvent>) -> Vec<TransitionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test]
async fn ttl_zero_deletes_on_the_same_pass() {
    let adapter = Arc::new(ScriptedAdapter::new(
        "ebs-volume",
        vec![candidate("ebs-volume", "vol-1", &[])],
    ));
    let mut h = harness(vec![adapter.clone()], FilterRules::default(), run_config());

    let summary = h.orchestrator.run().await.unwrap();
    assert_eq!(summary.totals.deleted, 1);
    assert!(!summary.has_failures());

    let key = CandidateKey::new(&scope(), "ebs-volume", "vol-1");
    assert_eq!(h.store.get(&key).unwrap().phase, Phase::Deleted);

    let events = drain(&mut h.events);
    let deleting = events
        .iter()
        .find(|e| e.to == Phase::Deleting)
        .expect("deleting transition emitted");
    assert_eq!(deleting.reason, "no quarantine TTL, deleting immediately");

    let phases: Vec<Phase> = events.into_iter().map(|e| e.to).collect();
    assert_eq!(
        phases,
        vec![
            Phase::Discovered,
            Phase::Quarantined,
            Phase::Deleting,
            Phase::Deleted
        ]
    );
    assert_eq!(adapter.quarantine_calls.load(Ordering::SeqCst), 1);
    assert_eq!(adapter.delete_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn excluded_candidate_is_skipped_and_never_mutated() {
    let adapter = Arc::new(ScriptedAdapter::new(
        "ec2-instance",
        vec![candidate("ec2-instance", "prod-web", &[])],
    ));
    let rules = FilterRules {
        exclude_name_patterns: vec!["prod-*".into()],
        ..Default::default()
    };
    let mut h = harness(vec![adapter.clone()], rules, run_config());

    let summary = h.orchestrator.run().await.unwrap();
    assert_eq!(summary.totals.skipped, 1);
    assert_eq!(adapter.quarantine_calls.load(Ordering::SeqCst), 0);
    assert_eq!(adapter.delete_calls.load(Ordering::SeqCst), 0);

    let key = CandidateKey::new(&scope(), "ec2-instance", "prod-web");
    assert_eq!(h.store.get(&key).unwrap().phase, Phase::Skipped);
    assert!(drain(&mut h.events).iter().all(|e| e.to != Phase::Deleting));
}

#[tokio::test]
async fn do_not_delete_tag_reaches_protected_never_deleting() {
    let adapter = Arc::new(ScriptedAdapter::new(
        "ec2-instance",
        vec![candidate("ec2-instance", "i-1", &[("DoNotDelete", "true")])],
    ));
    let rules = FilterRules {
        protect_tags: [("DoNotDelete".to_string(), vec!["true".to_string()])]
            .into_iter()
            .collect(),
        ..Default::default()
    };
    let mut h = harness(vec![adapter.clone()], rules, run_config());

    let summary = h.orchestrator.run().await.unwrap();
    assert_eq!(summary.totals.protected, 1);
    assert_eq!(adapter.delete_calls.load(Ordering::SeqCst), 0);
    assert!(drain(&mut h.events).iter().all(|e| e.to != Phase::Deleting));
}

#[tokio::test]
async fn transient_failures_then_success_records_attempt_count() {
    let adapter = Arc::new(
        ScriptedAdapter::new("ebs-volume", vec![candidate("ebs-volume", "vol-1", &[])])
            .script_deletes(vec![
                Outcome::TransientFailure("throttled".into()),
                Outcome::TransientFailure("throttled".into()),
                Outcome::TransientFailure("throttled".into()),
                Outcome::Success,
            ]),
    );
    let h = harness(vec![adapter.clone()], FilterRules::default(), run_config());

    let summary = h.orchestrator.run().await.unwrap();
    assert_eq!(summary.totals.deleted, 1);

    let key = CandidateKey::new(&scope(), "ebs-volume", "vol-1");
    let record = h.store.get(&key).unwrap();
    assert_eq!(record.phase, Phase::Deleted);
    assert_eq!(record.attempts, 4);
    assert_eq!(adapter.delete_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn exhausted_retries_end_in_failed_with_last_error() {
    let adapter = Arc::new(
        ScriptedAdapter::new("ebs-volume", vec![candidate("ebs-volume", "vol-1", &[])])
            .script_deletes(vec![
                Outcome::TransientFailure("rate limit".into());
                5
            ]),
    );
    let h = harness(vec![adapter.clone()], FilterRules::default(), run_config());

    let summary = h.orchestrator.run().await.unwrap();
    assert_eq!(summary.totals.failed, 1);
    assert!(summary.has_failures());

    let key = CandidateKey::new(&scope(), "ebs-volume", "vol-1");
    let record = h.store.get(&key).unwrap();
    assert_eq!(record.phase, Phase::Failed);
    assert_eq!(record.attempts, 5);
    assert_eq!(record.last_error.as_deref(), Some("rate limit"));
}

#[tokio::test]
async fn permanent_failure_is_not_retried() {
    let adapter = Arc::new(
        ScriptedAdapter::new("iam-role", vec![candidate("iam-role", "role-1", &[])])
            .script_deletes(vec![Outcome::PermanentFailure("access denied".into())]),
    );
    let h = harness(vec![adapter.clone()], FilterRules::default(), run_config());

    h.orchestrator.run().await.unwrap();
    assert_eq!(adapter.delete_calls.load(Ordering::SeqCst), 1);
    let key = CandidateKey::new(&scope(), "iam-role", "role-1");
    assert_eq!(h.store.get(&key).unwrap().phase, Phase::Failed);
}

#[tokio::test]
async fn waves_order_deletes_across_kinds() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let ec2 = Arc::new(
        ScriptedAdapter::new(
            "ec2-instance",
            vec![
                candidate("ec2-instance", "i-1", &[]),
                candidate("ec2-instance", "i-2", &[]),
            ],
        )
        .log_deletes_to(log.clone()),
    );
    let ebs = Arc::new(
        ScriptedAdapter::new(
            "ebs-volume",
            vec![
                candidate("ebs-volume", "vol-1", &[]),
                candidate("ebs-volume", "vol-2", &[]),
            ],
        )
        .blocked_by(&["ec2-instance"])
        .log_deletes_to(log.clone()),
    );
    let h = harness(vec![ec2, ebs], FilterRules::default(), run_config());

    let summary = h.orchestrator.run().await.unwrap();
    assert_eq!(summary.totals.deleted, 4);

    let order = log.lock().unwrap().clone();
    let last_blocker = order
        .iter()
        .rposition(|k| *k == "ec2-instance")
        .expect("ec2 deletes logged");
    let first_dependent = order
        .iter()
        .position(|k| *k == "ebs-volume")
        .expect("ebs deletes logged");
    assert!(
        last_blocker < first_dependent,
        "every ec2-instance delete must precede ebs-volume deletes: {order:?}"
    );
}

#[tokio::test]
async fn cycle_aborts_before_any_adapter_call() {
    let a = Arc::new(
        ScriptedAdapter::new("kind-a", vec![candidate("kind-a", "a-1", &[])])
            .blocked_by(&["kind-b"]),
    );
    let b = Arc::new(
        ScriptedAdapter::new("kind-b", vec![candidate("kind-b", "b-1", &[])])
            .blocked_by(&["kind-a"]),
    );
    let h = harness(vec![a.clone(), b.clone()], FilterRules::default(), run_config());

    let err = h.orchestrator.run().await.unwrap_err();
    match err {
        ReaperError::CycleDetected(kinds) => {
            assert_eq!(kinds, vec!["kind-a".to_string(), "kind-b".to_string()]);
        }
        other => panic!("expected CycleDetected, got {other:?}"),
    }
    assert_eq!(a.discover_calls.load(Ordering::SeqCst), 0);
    assert_eq!(b.discover_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn dry_run_touches_nothing() {
    let adapter = Arc::new(ScriptedAdapter::new(
        "s3-bucket",
        vec![candidate("s3-bucket", "bucket-1", &[])],
    ));
    let config = RunConfig {
        dry_run: true,
        ..run_config()
    };
    let h = harness(vec![adapter.clone()], FilterRules::default(), config);

    let summary = h.orchestrator.run().await.unwrap();
    assert_eq!(summary.totals.skipped, 1);
    assert_eq!(summary.totals.deleted, 0);
    assert_eq!(adapter.quarantine_calls.load(Ordering::SeqCst), 0);
    assert_eq!(adapter.delete_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn nonzero_ttl_leaves_candidate_quarantined() {
    let adapter = Arc::new(ScriptedAdapter::new(
        "ebs-volume",
        vec![candidate("ebs-volume", "vol-1", &[])],
    ));
    let config = RunConfig {
        quarantine_ttl: Duration::from_secs(3600),
        ..run_config()
    };
    let h = harness(vec![adapter.clone()], FilterRules::default(), config);

    let summary = h.orchestrator.run().await.unwrap();
    assert_eq!(summary.totals.quarantined, 1);
    assert_eq!(summary.totals.deleted, 0);
    assert_eq!(adapter.quarantine_calls.load(Ordering::SeqCst), 1);
    assert_eq!(adapter.delete_calls.load(Ordering::SeqCst), 0);

    let key = CandidateKey::new(&scope(), "ebs-volume", "vol-1");
    assert_eq!(h.store.get(&key).unwrap().phase, Phase::Quarantined);
}

#[tokio::test]
async fn restart_skips_settled_and_resumes_deleting() {
    let adapter = Arc::new(ScriptedAdapter::new(
        "ebs-volume",
        vec![
            candidate("ebs-volume", "vol-done", &[]),
            candidate("ebs-volume", "vol-stuck", &[]),
        ],
    ));
    let h = harness(vec![adapter.clone()], FilterRules::default(), run_config());

    // Simulate a prior aborted run: one candidate finished, one was cut off
    // mid-delete.
    h.store.transition(
        &CandidateKey::new(&scope(), "ebs-volume", "vol-done"),
        Phase::Deleted,
        None,
        None,
    );
    h.store.transition(
        &CandidateKey::new(&scope(), "ebs-volume", "vol-stuck"),
        Phase::Deleting,
        None,
        None,
    );

    let summary = h.orchestrator.run().await.unwrap();
    assert_eq!(summary.totals.deleted, 2);
    // Only the stuck candidate needed an adapter call; the settled one was
    // skipped without re-invoking anything.
    assert_eq!(adapter.quarantine_calls.load(Ordering::SeqCst), 0);
    assert_eq!(adapter.delete_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dry_run_keeps_reloaded_deleting_resumable() {
    let adapter = Arc::new(ScriptedAdapter::new(
        "ebs-volume",
        vec![candidate("ebs-volume", "vol-stuck", &[])],
    ));
    let config = RunConfig {
        dry_run: true,
        ..run_config()
    };
    let h = harness(vec![adapter.clone()], FilterRules::default(), config);

    let key = CandidateKey::new(&scope(), "ebs-volume", "vol-stuck");
    h.store.transition(&key, Phase::Deleting, None, None);

    let summary = h.orchestrator.run().await.unwrap();
    // The pending delete is neither performed nor overwritten with a terminal
    // phase; it stays resumable for the next real run and is reported as
    // interrupted.
    assert_eq!(adapter.delete_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.store.get(&key).unwrap().phase, Phase::Deleting);
    assert_eq!(summary.totals.interrupted, 1);
    assert!(!summary.cancelled);
}

#[tokio::test]
async fn cancelled_run_starts_nothing_and_reports_cancelled() {
    let adapter = Arc::new(ScriptedAdapter::new(
        "ebs-volume",
        vec![candidate("ebs-volume", "vol-1", &[])],
    ));
    let h = harness(vec![adapter.clone()], FilterRules::default(), run_config());

    h.orchestrator.cancellation_token().cancel();
    let summary = h.orchestrator.run().await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.totals.total(), 0);
    assert_eq!(adapter.discover_calls.load(Ordering::SeqCst), 0);
}
