//! Error types for pgweave

use thiserror::Error;

/// Result type alias for pgweave operations
pub type WeaveResult<T> = Result<T, WeaveError>;

/// Error types surfaced to callers.
///
/// The core recovers nothing internally: driver failures pass through with
/// their message intact, and a failure inside a transaction callback rolls
/// the transaction back before surfacing.
#[derive(Debug, Clone, Error)]
pub enum WeaveError {
    /// Invalid schema or builder use (unsupported column type, empty INSERT,
    /// JOIN on a mutation, soft-delete operator on an uncovered table, ...)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Any failure surfaced by the driver
    #[error("driver error: {0}")]
    Driver(String),

    /// Migration runner failure (unregistered module, invalid name,
    /// unreadable directory, tracking table inaccessible)
    #[error("migration error: {0}")]
    Migration(String),
}

impl WeaveError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a driver error
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver(message.into())
    }

    /// Create a migration error
    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration(message.into())
    }

    /// Check if this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<tokio_postgres::Error> for WeaveError {
    fn from(err: tokio_postgres::Error) -> Self {
        // Prefer the server's message over the client wrapper's.
        match err.as_db_error() {
            Some(db_err) => Self::Driver(db_err.message().to_string()),
            None => Self::Driver(err.to_string()),
        }
    }
}
