//! Unified error handling for the identity store.
//!
//! Provides a single error type returned by every store, session and
//! unit-of-work operation. Mapping and domain errors convert into it.

use domain::DomainError;
use thiserror::Error;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    // Caller errors
    #[error("Value cannot be null or empty: {0}")]
    Argument(String),

    #[error("Cannot access a disposed object: {0}")]
    Disposed(&'static str),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    // Mapping / configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Storage
    /// An update matched no row
    #[error("Row not found")]
    NotFound,

    /// A unique key (user name, role name, login) is already taken
    #[error("Duplicate key: {0}")]
    Conflict(String),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(sea_orm::DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable error code, independent of the message
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Argument(_) => "ARGUMENT_ERROR",
            AppError::Disposed(_) => "OBJECT_DISPOSED",
            AppError::InvalidOperation(_) => "INVALID_OPERATION",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::NotFound => "ROW_NOT_FOUND",
            AppError::Conflict(_) => "DUPLICATE_KEY",
            #[cfg(feature = "database")]
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn argument(name: impl Into<String>) -> Self {
        AppError::Argument(name.into())
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        AppError::InvalidOperation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::Configuration(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Argument(name) => AppError::Argument(name),
            DomainError::InvalidKey(msg) => AppError::InvalidOperation(msg),
        }
    }
}

#[cfg(feature = "database")]
impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) => AppError::Conflict(detail),
            _ => AppError::Database(err),
        }
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_argument_maps_to_argument() {
        let err: AppError = DomainError::argument("userName").into();
        assert!(matches!(err, AppError::Argument(ref n) if n == "userName"));
        assert_eq!(err.code(), "ARGUMENT_ERROR");
    }

    #[test]
    fn test_invalid_key_maps_to_invalid_operation() {
        let err: AppError = DomainError::invalid_key("expected Int key").into();
        assert!(matches!(err, AppError::InvalidOperation(_)));
        assert_eq!(err.to_string(), "Invalid operation: expected Int key");
    }

    #[test]
    fn test_disposed_names_the_object() {
        let err = AppError::Disposed("UserStore");
        assert_eq!(err.to_string(), "Cannot access a disposed object: UserStore");
        assert_eq!(err.code(), "OBJECT_DISPOSED");
    }
}
