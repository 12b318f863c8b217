//! Execution layer error types.
//!
//! These cover building an executor. Call outcomes are reported as
//! `relay_domain::AppError`.

use thiserror::Error;

/// Errors that can occur while setting up the execution layer.
#[derive(Debug, Error)]
pub enum ExecError {
    /// HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for execution layer setup.
pub type ExecResult<T> = Result<T, ExecError>;
