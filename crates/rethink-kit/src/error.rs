//! Error types for the rethink-kit library

use thiserror::Error;

/// Result type alias for rethink-kit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when using rethink-kit
#[derive(Debug, Error)]
pub enum Error {
    /// No database driver has been registered with the process
    #[error("database driver is not available: {0}")]
    DriverUnavailable(String),

    /// Transport-level connection failure
    #[error("failed to connect to the database: {0}")]
    Connection(String),

    /// Query execution failed
    #[error("query execution failed: {0}")]
    Query(String),

    /// A cursor could not be materialized into memory
    #[error("failed to drain cursor: {0}")]
    CursorDrain(String),

    /// The pool could not provide a connection
    #[error("failed to acquire a pooled connection: {0}")]
    Acquire(String),

    /// Invalid configuration detected before any I/O was attempted
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Deserialization error
    #[error("failed to deserialize result: {0}")]
    Deserialization(#[from] serde_json::Error),
}
