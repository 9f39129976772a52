//! Error types for the store
//!
//! Only `ConfigurationMissing` ever reaches a caller of the public store
//! API; everything else is logged at the boundary of the method that hit it
//! and replaced by that method's documented fallback value.

use thiserror::Error;

/// Result type for internal store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised inside the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No configuration provider was available at construction.
    #[error("database configuration is missing: {0}")]
    ConfigurationMissing(String),

    /// The backend could not be reached.
    #[error("database connection failed: {0}")]
    ConnectionFailure(String),

    /// A CREATE TABLE statement failed.
    #[error("failed to provision table '{table}': {reason}")]
    SchemaFailure { table: String, reason: String },

    /// A value could not be encoded or a stored value could not be decoded.
    #[error("serialization error: {0}")]
    SerializationFailure(#[from] serde_json::Error),

    /// The stored type tag differs from the one the caller asked for.
    #[error("type mismatch: expected '{expected}', found '{found}'")]
    TypeMismatch { expected: String, found: String },

    /// A table or namespace name is not a plain SQL identifier.
    #[error("invalid table name '{0}'")]
    InvalidName(String),

    /// A stored row could not be mapped back into a record.
    #[error("invalid row data: {0}")]
    InvalidRow(String),

    /// A statement failed at the driver.
    #[error("query failed: {0}")]
    Query(String),

    /// The configured backend was not compiled into this build.
    #[error("backend '{0}' is not available in this build")]
    BackendUnavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Query(e.to_string())
    }
}

#[cfg(feature = "mysql")]
impl From<mysql::Error> for StoreError {
    fn from(e: mysql::Error) -> Self {
        StoreError::Query(e.to_string())
    }
}
