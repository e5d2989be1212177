//! Bounded retry with exponential backoff and jitter around a single
//! adapter call.

use rand::Rng;
use reaper_core::{Outcome, RetryPolicy};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Final outcome of a retried operation, with observability counters.
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub outcome: Outcome,
    /// Number of times the operation was invoked (1-based).
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Wraps one fallible adapter operation with bounded retries.
///
/// Only [`Outcome::TransientFailure`] is retried; permanent failures and
/// successes return immediately. Backoff sleeps are cancellation-aware: once
/// the run token is cancelled the last outcome is returned without further
/// invocations.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute<F, Fut>(
        &self,
        cancel: &CancellationToken,
        description: &str,
        mut op: F,
    ) -> RetryOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let outcome = op().await;

            match &outcome {
                Outcome::TransientFailure(reason) if attempts < self.policy.max_attempts => {
                    let delay = self.backoff_delay(attempts);
                    tracing::debug!(
                        op = description,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "transient failure, backing off"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => {
                            tracing::debug!(op = description, attempt = attempts, "retry cancelled");
                            return RetryOutcome {
                                outcome,
                                attempts,
                                elapsed: start.elapsed(),
                            };
                        }
                    }
                }
                _ => {
                    return RetryOutcome {
                        outcome,
                        attempts,
                        elapsed: start.elapsed(),
                    };
                }
            }
        }
    }

    /// `min(max_delay, base * 2^(attempt-1))` with symmetric jitter, clamped
    /// so no single sleep exceeds `max_delay`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.policy.base_delay.as_secs_f64() * 2f64.powi(attempt.saturating_sub(1) as i32);
        let capped = exp.min(self.policy.max_delay.as_secs_f64());

        let jittered = if self.policy.jitter_fraction > 0.0 {
            let j = rand::thread_rng()
                .gen_range(-self.policy.jitter_fraction..=self.policy.jitter_fraction);
            capped * (1.0 + j)
        } else {
            capped
        };

        Duration::from_secs_f64(jittered.max(0.0)).min(self.policy.max_delay)
    }
}
