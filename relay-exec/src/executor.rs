//! HTTP executor: the resilient request executor used by every adapter.
//!
//! Composition per upstream:
//!
//! ```text
//! HttpExecutor
//!   inject x-trace-id / x-request-id from the ambient RequestContext
//!   └─ CircuitBreaker (fail fast, call deadline)
//!        └─ RetryLayer (backoff + jitter)
//!             └─ Transport (one attempt)
//!   classify failures into AppError
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use relay_domain::AppResult;

use crate::breaker::{BreakerConfig, CircuitBreaker, CircuitState};
use crate::classify::classify;
use crate::context::inject_current;
use crate::descriptor::RequestDescriptor;
use crate::error::ExecResult;
use crate::ports::{RequestExecutor, Transport};
use crate::retry::{RetryLayer, RetryPolicy, DEFAULT_RETRYABLE_STATUS_CODES};
use crate::transport::ReqwestTransport;

/// Slack added to the per-attempt timeout to form the call deadline.
const CALL_DEADLINE_SLACK: Duration = Duration::from_millis(500);

/// Executor settings for one upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Upstream base URL
    pub base_url: String,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Retry budget
    pub max_retries: u32,
    /// Statuses considered transient
    pub retryable_status_codes: Vec<u16>,
    /// Breaker thresholds
    pub breaker: BreakerConfig,
}

impl ExecutorConfig {
    /// Defaults: 5s timeout, 3 retries, default retryable set.
    pub fn new(base_url: impl Into<String>) -> Self {
        let timeout = Duration::from_millis(5000);
        Self {
            base_url: base_url.into(),
            timeout,
            max_retries: 3,
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.to_vec(),
            breaker: BreakerConfig {
                call_timeout: Some(timeout + CALL_DEADLINE_SLACK),
                ..BreakerConfig::default()
            },
        }
    }

    /// Set the per-attempt timeout; the call deadline follows it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.breaker.call_timeout = Some(timeout + CALL_DEADLINE_SLACK);
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Replace the retryable status set.
    pub fn with_retryable_status_codes(mut self, codes: Vec<u16>) -> Self {
        self.retryable_status_codes = codes;
        self
    }

    /// Replace breaker thresholds.
    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    /// Retry policy derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries)
            .with_retryable_status_codes(self.retryable_status_codes.clone())
    }
}

/// Resilient executor for one upstream.
///
/// Holds its own breaker: two executors never share breaker state.
pub struct HttpExecutor<T = ReqwestTransport> {
    base_url: String,
    chain: CircuitBreaker<RetryLayer<T>>,
}

impl HttpExecutor<ReqwestTransport> {
    /// Executor over real HTTP.
    pub fn new(config: ExecutorConfig) -> ExecResult<Self> {
        let transport = ReqwestTransport::new(config.base_url.clone(), config.timeout)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> HttpExecutor<T> {
    /// Executor over an arbitrary transport.
    pub fn with_transport(config: ExecutorConfig, transport: T) -> Self {
        let retry = RetryLayer::new(transport, config.retry_policy());
        Self {
            base_url: config.base_url,
            chain: CircuitBreaker::new(retry, config.breaker),
        }
    }

    /// Upstream base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Breaker state.
    pub fn circuit_state(&self) -> CircuitState {
        self.chain.state()
    }
}

#[async_trait]
impl<T: Transport> RequestExecutor for HttpExecutor<T> {
    async fn execute(&self, mut descriptor: RequestDescriptor) -> AppResult<Option<Value>> {
        inject_current(&mut descriptor);
        debug!(
            method = %descriptor.method,
            base_url = %self.base_url,
            path = %descriptor.path,
            "Dispatching upstream request"
        );

        match self.chain.send(&mut descriptor).await {
            Ok(response) => {
                debug!(
                    status = response.status,
                    retry_count = descriptor.retry.retry_count,
                    "Upstream request succeeded"
                );
                Ok(response.body)
            },
            Err(failure) => {
                let error = classify(&failure, &descriptor, &self.base_url);
                warn!(
                    method = %descriptor.method,
                    path = %descriptor.path,
                    kind = %error.kind(),
                    status = error.status_code(),
                    retry_count = descriptor.retry.retry_count,
                    error = %failure,
                    "Upstream request failed"
                );
                Err(error)
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
