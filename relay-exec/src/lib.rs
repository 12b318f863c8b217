//! Purchase Relay Execution Layer
//!
//! Resilient outbound HTTP calls to unreliable third-party services.
//!
//! # Architecture
//!
//! ```text
//! Adapter → HttpExecutor → CircuitBreaker → RetryLayer → Transport → Upstream
//!                ↓
//!            classify (TransportFailure → AppError)
//! ```
//!
//! # Components
//!
//! - **Ports**: `Transport` (one bare call) and `RequestExecutor` (one
//!   classified logical call)
//! - **RetryLayer**: exponential backoff with jitter over a `Transport`
//! - **CircuitBreaker**: rolling failure-rate breaker over a `Transport`
//! - **HttpExecutor**: composes the layers, injects correlation headers and
//!   classifies every failure into the `AppError` taxonomy
//! - **Stub**: scripted transport for tests
//!
//! # Example
//!
//! ```rust,ignore
//! use relay_exec::{ExecutorConfig, HttpExecutor, RequestDescriptor, RequestExecutor};
//!
//! let executor = HttpExecutor::new(ExecutorConfig::new("https://api.example.com"))?;
//! let body = executor.execute(RequestDescriptor::get("/purchases/42")).await?;
//! ```

#![warn(clippy::all)]

pub mod breaker;
pub mod classify;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod ports;
pub mod retry;
pub mod stub;
pub mod transport;

// Re-exports for convenience
pub use breaker::{BreakerConfig, CircuitBreaker, CircuitState};
pub use classify::classify;
pub use context::{RequestContext, REQUEST_ID_HEADER, TRACE_ID_HEADER};
pub use descriptor::{Method, RequestDescriptor, RetryMetadata};
pub use error::{ExecError, ExecResult};
pub use executor::{ExecutorConfig, HttpExecutor};
pub use ports::{decode_body, RequestExecutor, Transport, TransportFailure, UpstreamResponse};
pub use retry::{RetryLayer, RetryPolicy, DEFAULT_RETRYABLE_STATUS_CODES};
pub use stub::{RecordedRequest, StubTransport};
pub use transport::ReqwestTransport;
