//! Outcome classification: `TransportFailure` → `AppError`.
//!
//! Checks run in order and the first match wins:
//!
//! | Condition | Kind | Status |
//! |---|---|---|
//! | circuit open | `RETRY_EXHAUSTED` | 503 |
//! | retry budget exhausted, or deadline hit after a retry | `RETRY_EXHAUSTED` | upstream status or 503 |
//! | timeout / network | `TIMEOUT` | 504 |
//! | 429 | `RATE_LIMIT` | 429 |
//! | 5xx | `UPSTREAM_5XX` | upstream status |
//! | 4xx | `UPSTREAM_4XX` | upstream status |
//! | anything else | `INTERNAL_ERROR` | 500 |

use relay_domain::{AppError, ErrorKind, UpstreamDetails};

use crate::descriptor::RequestDescriptor;
use crate::ports::TransportFailure;

/// Classify a failed call.
///
/// Every error carries `{method, url, baseURL, status}` details and the raw
/// failure as its cause.
pub fn classify(
    failure: &TransportFailure,
    descriptor: &RequestDescriptor,
    base_url: &str,
) -> AppError {
    let status = failure.status();

    let (kind, status_code, message) = match failure {
        TransportFailure::CircuitOpen => (
            ErrorKind::RetryExhausted,
            503,
            "Upstream circuit breaker is open",
        ),
        _ if descriptor.retry.exhausted => (
            ErrorKind::RetryExhausted,
            status.unwrap_or(503),
            "Retry attempts exhausted",
        ),
        TransportFailure::Timeout(_) | TransportFailure::Network(_) => (
            ErrorKind::Timeout,
            504,
            "Upstream request timed out",
        ),
        TransportFailure::Status { status: 429, .. } => (
            ErrorKind::RateLimit,
            429,
            "Upstream rate limit exceeded",
        ),
        TransportFailure::Status { status, .. } if *status >= 500 => (
            ErrorKind::Upstream5xx,
            *status,
            "Upstream service error",
        ),
        TransportFailure::Status { status, .. } if *status >= 400 => (
            ErrorKind::Upstream4xx,
            *status,
            "Upstream rejected the request",
        ),
        TransportFailure::Malformed { .. } => (
            ErrorKind::InternalError,
            500,
            "Malformed upstream response",
        ),
        TransportFailure::Status { .. } => (
            ErrorKind::InternalError,
            500,
            "Unexpected upstream response",
        ),
    };

    let upstream = UpstreamDetails {
        method: descriptor.method.to_string(),
        url: descriptor.path.clone(),
        base_url: base_url.to_string(),
        status,
    };

    AppError::new(kind, status_code, message)
        .with_upstream(&upstream)
        .with_cause(failure.clone())
}
