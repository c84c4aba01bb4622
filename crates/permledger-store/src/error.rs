//! Error types for the store module.

use permledger_core::{StateError, ValidationError};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Event serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The event does not link onto the current log head.
    #[error("event rejected: {0}")]
    Validation(#[from] ValidationError),

    /// The event's effect violates registry or role invariants.
    #[error("invalid event: {0}")]
    InvalidEvent(#[from] StateError),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// An in-memory lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
