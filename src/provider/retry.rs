//! Bounded exponential backoff around remote calls.
//!
//! [`RetryExecutor::execute`] runs an operation, classifies each failure and
//! decides whether to try again. Delays double per attempt up to a ceiling,
//! are raised to the provider's `Retry-After` when one is sent, and are
//! spread with symmetric jitter.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use metrics::counter;
use rand::{Rng, thread_rng};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::RetryPolicyConfig;
use crate::provider::error::{RetryableError, TransportError, classify};

/// Which failures are retried and how long to wait between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first call.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: f64,
    /// Non-idempotent operations are never retried.
    pub idempotent: bool,
    pub retryable_codes: BTreeSet<u16>,
    pub retryable_reasons: BTreeSet<String>,
    pub retryable_statuses: BTreeSet<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryPolicyConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryPolicyConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter.clamp(0.0, 1.0),
            idempotent: true,
            retryable_codes: [429, 500, 502, 503, 504].into_iter().collect(),
            retryable_reasons: [
                "rateLimitExceeded",
                "userRateLimitExceeded",
                "quotaExceeded",
                "backendError",
                "internalError",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            retryable_statuses: [
                "RESOURCE_EXHAUSTED",
                "UNAVAILABLE",
                "INTERNAL",
                "DEADLINE_EXCEEDED",
                "ABORTED",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }

    pub fn with_idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    pub fn is_retryable(&self, err: &RetryableError) -> bool {
        self.retryable_codes.contains(&err.code)
            || self.retryable_reasons.contains(&err.reason)
            || err
                .status
                .as_ref()
                .is_some_and(|status| self.retryable_statuses.contains(status))
    }

    /// Delay before retry number `attempt` (zero-based), with a random jitter sample.
    pub fn next_delay(&self, attempt: u32, retry_after_seconds: Option<u64>) -> Duration {
        let sample = if self.jitter > 0.0 {
            thread_rng().gen_range(-1.0..=1.0)
        } else {
            0.0
        };
        backoff_delay(self, attempt, retry_after_seconds, sample)
    }
}

/// Backoff for retry number `attempt` (zero-based).
///
/// `jitter_sample` in `[-1.0, 1.0]` scales the jitter band. The result is
/// never below the provider's `Retry-After`, whatever the sample.
pub fn backoff_delay(
    policy: &RetryPolicy,
    attempt: u32,
    retry_after_seconds: Option<u64>,
    jitter_sample: f64,
) -> Duration {
    let base_ms = policy.base_delay.as_millis() as f64;
    let max_ms = policy.max_delay.as_millis() as f64;
    let floor_ms = retry_after_seconds.unwrap_or(0) as f64 * 1000.0;

    let exponential = (base_ms * 2_f64.powi(attempt.min(31) as i32)).min(max_ms);
    let delay = exponential.max(floor_ms);

    let sample = jitter_sample.clamp(-1.0, 1.0);
    let jittered = (delay * (1.0 + policy.jitter * sample)).max(floor_ms).max(0.0);

    Duration::from_millis(jittered.round() as u64)
}

/// Runs remote operations under a [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
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

    /// Run `operation` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent. The returned error carries `label` as context.
    pub async fn execute<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, RetryableError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => classify(&err).with_context(label),
            };

            if !self.policy.idempotent {
                debug!(operation = label, "Operation is not idempotent; not retrying");
                return Err(err);
            }

            if !self.policy.is_retryable(&err) {
                return Err(err);
            }

            if attempt >= self.policy.max_attempts {
                warn!(
                    operation = label,
                    attempts = attempt,
                    code = err.code,
                    reason = %err.reason,
                    "Retry budget exhausted"
                );
                return Err(err);
            }

            let delay = self.policy.next_delay(attempt - 1, err.retry_after_seconds);
            warn!(
                operation = label,
                attempt,
                code = err.code,
                reason = %err.reason,
                retry_after_seconds = ?err.retry_after_seconds,
                delay_ms = delay.as_millis() as u64,
                "Retrying remote call after transient failure"
            );
            counter!("calsync_retries_total", "reason" => err.reason.clone()).increment(1);

            sleep(delay).await;
        }
    }
}
