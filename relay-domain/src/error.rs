//! Typed error taxonomy.
//!
//! `AppError` is the only error type that crosses component boundaries.
//! Lower layers keep their own error enums and convert at the edge.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Error Kind
// =============================================================================

/// Closed, flat classification of every failure the relay can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Unclassified failure
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    /// Input shape violation or conflict
    #[serde(rename = "VALIDATION")]
    Validation,
    /// Upstream answered with 4xx
    #[serde(rename = "UPSTREAM_4XX")]
    Upstream4xx,
    /// Upstream answered with 5xx
    #[serde(rename = "UPSTREAM_5XX")]
    Upstream5xx,
    /// Connection failure or timeout
    #[serde(rename = "TIMEOUT")]
    Timeout,
    /// Upstream answered with 429
    #[serde(rename = "RATE_LIMIT")]
    RateLimit,
    /// Retry budget spent or circuit open
    #[serde(rename = "RETRY_EXHAUSTED")]
    RetryExhausted,
}

impl ErrorKind {
    /// Wire code for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InternalError => "INTERNAL_ERROR",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Upstream4xx => "UPSTREAM_4XX",
            ErrorKind::Upstream5xx => "UPSTREAM_5XX",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::RateLimit => "RATE_LIMIT",
            ErrorKind::RetryExhausted => "RETRY_EXHAUSTED",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Upstream Details
// =============================================================================

/// Diagnostic block attached to errors produced by an outbound call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamDetails {
    /// HTTP method of the failed call
    pub method: String,
    /// Relative path of the failed call
    pub url: String,
    /// Base URL of the upstream
    #[serde(rename = "baseURL")]
    pub base_url: String,
    /// HTTP status, when the upstream answered at all
    pub status: Option<u16>,
}

// =============================================================================
// App Error
// =============================================================================

/// Shared, cloneable error cause.
pub type ErrorCause = Arc<dyn StdError + Send + Sync + 'static>;

/// Classified error carried across component boundaries.
#[derive(Debug, Clone)]
pub struct AppError {
    message: String,
    kind: ErrorKind,
    status_code: u16,
    details: Option<Value>,
    cause: Option<ErrorCause>,
}

/// Result alias for operations that fail with `AppError`.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create an error with explicit kind and HTTP-equivalent status.
    pub fn new(kind: ErrorKind, status_code: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            status_code,
            details: None,
            cause: None,
        }
    }

    /// `INTERNAL_ERROR/500`.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, 500, message)
    }

    /// `VALIDATION/400`.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, 400, message)
    }

    /// `VALIDATION/409`, used for duplicate submissions.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, 409, message)
    }

    /// `UPSTREAM_4XX/404`, used when an upstream has no such record.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Upstream4xx, 404, message)
    }

    /// Attach a diagnostic payload.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach upstream call details.
    pub fn with_upstream(self, upstream: &UpstreamDetails) -> Self {
        match serde_json::to_value(upstream) {
            Ok(details) => self.with_details(details),
            Err(_) => self,
        }
    }

    /// Attach the underlying cause.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Classification.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// HTTP-equivalent status code.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Diagnostic payload, if any.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Wrapped cause, if any.
    pub fn cause(&self) -> Option<&ErrorCause> {
        self.cause.as_ref()
    }

    /// True for 5xx-class errors.
    pub fn is_server_error(&self) -> bool {
        self.status_code >= 500
    }

    /// Copy of this error with the detail block removed.
    pub fn without_details(&self) -> Self {
        Self {
            details: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.message, self.kind, self.status_code)
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|cause| cause as &(dyn StdError + 'static))
    }
}

// =============================================================================
// Tests
// =============================================================================
