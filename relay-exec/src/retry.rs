//! Retry with exponential backoff and jitter.
//!
//! Retry `k` (1-based) waits `2^k * base_delay + uniform[0, max_jitter)`.
//! A failure is retried when it carries no HTTP status (timeout, network)
//! or its status is in the retryable set.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

use crate::descriptor::RequestDescriptor;
use crate::ports::{Transport, TransportFailure, UpstreamResponse};

/// Statuses retried unless configured otherwise.
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Retry budget and backoff shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Statuses considered transient
    pub retryable_status_codes: Vec<u16>,
    /// Backoff unit
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the random jitter
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.to_vec(),
            base_delay: Duration::from_millis(100),
            max_jitter: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Default policy with the given retry budget.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Replace the retryable status set.
    pub fn with_retryable_status_codes(mut self, codes: Vec<u16>) -> Self {
        self.retryable_status_codes = codes;
        self
    }

    /// Whether `failure` is worth another attempt.
    pub fn is_retryable(&self, failure: &TransportFailure) -> bool {
        match failure {
            TransportFailure::CircuitOpen => false,
            other => match other.status() {
                None => true,
                Some(status) => self.retryable_status_codes.contains(&status),
            },
        }
    }

    /// Deterministic part of the delay before retry `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Full delay before retry `attempt`, jitter included.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
        };
        self.backoff(attempt) + jitter
    }
}

/// Transport decorator that retries transient failures.
///
/// Progress is recorded in `descriptor.retry`: `retry_count` after each
/// scheduled retry and `exhausted` when a retryable failure meets an empty
/// budget. Non-retryable failures return immediately with `exhausted` unset.
pub struct RetryLayer<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryLayer<T> {
    /// Wrap `inner`.
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryLayer<T> {
    async fn send(
        &self,
        descriptor: &mut RequestDescriptor,
    ) -> Result<UpstreamResponse, TransportFailure> {
        loop {
            let failure = match self.inner.send(descriptor).await {
                Ok(response) => return Ok(response),
                Err(failure) => failure,
            };

            if !self.policy.is_retryable(&failure) {
                return Err(failure);
            }

            if descriptor.retry.retry_count >= self.policy.max_retries {
                descriptor.retry.exhausted = true;
                warn!(
                    method = %descriptor.method,
                    path = %descriptor.path,
                    retry_count = descriptor.retry.retry_count,
                    error = %failure,
                    "Retry budget exhausted"
                );
                return Err(failure);
            }

            descriptor.retry.retry_count += 1;
            let delay = self.policy.delay_for(descriptor.retry.retry_count);
            debug!(
                method = %descriptor.method,
                path = %descriptor.path,
                retry_count = descriptor.retry.retry_count,
                delay_ms = delay.as_millis() as u64,
                status = ?failure.status(),
                "Retrying upstream request"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubTransport;
    use serde_json::json;
    use tokio::time::Instant;

    #[test]
    fn test_default_retryable_statuses() {
        let policy = RetryPolicy::default();

        for status in [408, 429, 500, 502, 503, 504] {
            assert!(policy.is_retryable(&TransportFailure::Status { status, body: None }));
        }
        for status in [400, 401, 404, 409, 422, 501] {
            assert!(!policy.is_retryable(&TransportFailure::Status { status, body: None }));
        }
        assert!(policy.is_retryable(&TransportFailure::Timeout("slow".into())));
        assert!(policy.is_retryable(&TransportFailure::Network("reset".into())));
        assert!(!policy.is_retryable(&TransportFailure::CircuitOpen));
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_jitter_bounds() {
        let policy = RetryPolicy::default();

        for _ in 0..100 {
            let delay = policy.delay_for(2);
            assert!(delay >= Duration::from_millis(400));
            assert!(delay < Duration::from_millis(500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_exhausted_with_backoff() {
        let stub = StubTransport::always_status(503);
        let layer = RetryLayer::new(stub.clone(), RetryPolicy::new(3));
        let mut descriptor = RequestDescriptor::get("/purchases/1");

        let started = Instant::now();
        let result = layer.send(&mut descriptor).await;
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(TransportFailure::Status { status: 503, .. })));
        assert_eq!(stub.call_count(), 4);
        assert_eq!(descriptor.retry.retry_count, 3);
        assert!(descriptor.retry.exhausted);
        // 200 + 400 + 800 plus at most 3 * 100 jitter
        assert!(elapsed >= Duration::from_millis(1400));
        assert!(elapsed < Duration::from_millis(1700));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gaps_between_attempts_grow() {
        let stub = StubTransport::always_status(502);
        let layer = RetryLayer::new(stub.clone(), RetryPolicy::new(2));

        let _ = layer.send(&mut RequestDescriptor::get("/x")).await;

        let times: Vec<Instant> = stub.requests().iter().map(|r| r.at).collect();
        assert_eq!(times.len(), 3);
        assert!(times[1] - times[0] >= Duration::from_millis(200));
        assert!(times[2] - times[1] >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_status_returns_immediately() {
        let stub = StubTransport::always_status(400);
        let layer = RetryLayer::new(stub.clone(), RetryPolicy::new(3));
        let mut descriptor = RequestDescriptor::post("/purchases");

        let result = layer.send(&mut descriptor).await;

        assert!(matches!(result, Err(TransportFailure::Status { status: 400, .. })));
        assert_eq!(stub.call_count(), 1);
        assert_eq!(descriptor.retry.retry_count, 0);
        assert!(!descriptor.retry.exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let stub = StubTransport::always_ok(Some(json!({"id": 7})));
        stub.push_failure(TransportFailure::Network("reset".into())).push_status(429);
        let layer = RetryLayer::new(stub.clone(), RetryPolicy::new(3));
        let mut descriptor = RequestDescriptor::get("/x");

        let response = layer.send(&mut descriptor).await.unwrap();

        assert_eq!(response.body, Some(json!({"id": 7})));
        assert_eq!(stub.call_count(), 3);
        assert_eq!(descriptor.retry.retry_count, 2);
        assert!(!descriptor.retry.exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_marks_exhausted_on_first_transient_failure() {
        let stub = StubTransport::always_status(503);
        let layer = RetryLayer::new(stub.clone(), RetryPolicy::new(0));
        let mut descriptor = RequestDescriptor::get("/x");

        let _ = layer.send(&mut descriptor).await;

        assert_eq!(stub.call_count(), 1);
        assert!(descriptor.retry.exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_retryable_set() {
        let stub = StubTransport::always_status(503);
        let policy = RetryPolicy::new(3).with_retryable_status_codes(vec![429]);
        let layer = RetryLayer::new(stub.clone(), policy);
        let mut descriptor = RequestDescriptor::get("/x");

        let _ = layer.send(&mut descriptor).await;

        assert_eq!(stub.call_count(), 1);
        assert!(!descriptor.retry.exhausted);
    }
}
