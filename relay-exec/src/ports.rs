//! Execution layer port definitions.
//!
//! `Transport` is one bare attempt (or a decorator around one).
//! `RequestExecutor` is one logical call with every failure classified.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use relay_domain::{AppError, AppResult};

use crate::descriptor::RequestDescriptor;

// =============================================================================
// Transport Port
// =============================================================================

/// Successful upstream round-trip (2xx).
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    /// HTTP status
    pub status: u16,
    /// Parsed JSON body; `None` when empty or `null`
    pub body: Option<Value>,
}

impl UpstreamResponse {
    /// 200 with the given body.
    pub fn ok(body: Option<Value>) -> Self {
        Self { status: 200, body }
    }
}

/// Unclassified outcome of a failed attempt.
#[derive(Debug, Clone, Error)]
pub enum TransportFailure {
    /// Upstream answered with a non-2xx status
    #[error("Upstream responded with HTTP {status}")]
    Status {
        /// HTTP status
        status: u16,
        /// Parsed body, if any
        body: Option<Value>,
    },

    /// Request or call deadline elapsed
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Connection could not be established or was dropped
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream answered but the body was not valid JSON
    #[error("Malformed response (HTTP {status}): {reason}")]
    Malformed {
        /// HTTP status
        status: u16,
        /// Parser message
        reason: String,
    },

    /// Circuit breaker rejected the call without dispatching it
    #[error("Circuit breaker open")]
    CircuitOpen,
}

impl TransportFailure {
    /// HTTP status, when the upstream answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportFailure::Status { status, .. } | TransportFailure::Malformed { status, .. } => {
                Some(*status)
            },
            TransportFailure::Timeout(_)
            | TransportFailure::Network(_)
            | TransportFailure::CircuitOpen => None,
        }
    }
}

/// One attempt against an upstream, or a resilience decorator around one.
///
/// Implementations:
/// - `ReqwestTransport` - real HTTP
/// - `RetryLayer` - backoff and retry around an inner transport
/// - `CircuitBreaker` - fail-fast around an inner transport
/// - `StubTransport` - scripted responses for tests
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request. Decorators may update `descriptor.retry`.
    async fn send(
        &self,
        descriptor: &mut RequestDescriptor,
    ) -> Result<UpstreamResponse, TransportFailure>;
}

// =============================================================================
// Request Executor Port
// =============================================================================

/// One logical call with every non-success outcome classified.
///
/// Adapters depend on this port only, never on a transport.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Execute the request and return the response body.
    async fn execute(&self, descriptor: RequestDescriptor) -> AppResult<Option<Value>>;
}

/// Decode a response body into `T`.
///
/// Empty and `null` bodies yield `Ok(None)`.
pub fn decode_body<T: DeserializeOwned>(body: Option<Value>) -> AppResult<Option<T>> {
    match body {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| AppError::internal("Malformed upstream response").with_cause(e)),
    }
}

// =============================================================================
// Tests
// =============================================================================
