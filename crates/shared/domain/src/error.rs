//! Domain-level errors.
//!
//! These errors represent misuse of the domain types and are independent of
//! infrastructure concerns (database, mapping compilation).

use thiserror::Error;

/// Domain-specific errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A required argument was null, empty or blank
    #[error("Value cannot be null or empty: {0}")]
    Argument(String),

    /// A key did not match the kind expected for the entity
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl DomainError {
    /// Create an argument error for the named parameter
    pub fn argument(name: impl Into<String>) -> Self {
        DomainError::Argument(name.into())
    }

    /// Create an invalid key error
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        DomainError::InvalidKey(msg.into())
    }
}

/// Result type alias for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Fails with [`DomainError::Argument`] when `value` is empty or whitespace.
pub fn require_text(value: &str, name: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::argument(name));
    }
    Ok(())
}
