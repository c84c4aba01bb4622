//! Error types for the permission manager.

use permledger_core::{DocumentHash, EventId, Principal, ValidationError};
use permledger_store::StoreError;
use thiserror::Error;

/// Errors that can occur during permission operations.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// The document hash is already registered.
    #[error("document already exists: {0}")]
    AlreadyExists(DocumentHash),

    /// The document hash has never been registered.
    #[error("document not found: {0}")]
    DocumentNotFound(DocumentHash),

    /// The caller is neither the master nor an owner of the document.
    #[error("{caller} is not authorized to manage roles on {document}")]
    Unauthorized {
        caller: Principal,
        document: DocumentHash,
    },

    /// The master's authority is structural; it cannot be delegated or removed.
    #[error("the master of {document} cannot be delegated or removed as a role member")]
    TargetIsMaster { document: DocumentHash },

    /// Another writer appended to the log concurrently.
    #[error("conflict at seq {seq}: existing event {existing}")]
    Conflict { seq: u64, existing: EventId },

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Validation error (ledger verification).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// JSON export error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermissionError>;
