//! Storage layer errors

use relay_domain::AppError;
use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// Duplicate entity (uniqueness violation)
    #[error("Duplicate entity: {entity_type} with id {id}")]
    Duplicate {
        /// Type of entity
        entity_type: String,
        /// Entity ID
        id: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Invalid store configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result alias for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Create a duplicate error
    pub fn duplicate(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Duplicate {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// True for uniqueness violations
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                // Unique constraint violation
                if db_err.code().map(|c| c == "23505").unwrap_or(false) {
                    StoreError::Duplicate {
                        entity_type: "unknown".to_string(),
                        id: "unknown".to_string(),
                    }
                } else {
                    StoreError::Database(db_err.to_string())
                }
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Connection(err.to_string())
            },
            _ => StoreError::Database(err.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::internal("Storage operation failed").with_cause(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_domain::ErrorKind;

    #[test]
    fn test_duplicate() {
        let err = StoreError::duplicate("job", "ext-1");
        assert!(err.is_duplicate());
        assert_eq!(err.to_string(), "Duplicate entity: job with id ext-1");
        assert!(!StoreError::Database("down".into()).is_duplicate());
    }

    #[test]
    fn test_into_app_error() {
        let err: AppError = StoreError::Connection("refused".into()).into();

        assert_eq!(err.kind(), ErrorKind::InternalError);
        assert_eq!(err.status_code(), 500);
        assert!(err.cause().is_some());
    }
}
