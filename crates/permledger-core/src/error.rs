//! Error types for Permledger Core.

use thiserror::Error;

use crate::role::Role;
use crate::types::{DocumentHash, EventId, Principal};

/// Errors that can occur while decoding ledger events.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unsupported event version: {0}")]
    UnsupportedVersion(u8),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// A state transition that the registry or role store refuses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("document already registered: {0}")]
    AlreadyExists(DocumentHash),

    #[error("document not registered: {0}")]
    DocumentNotFound(DocumentHash),

    #[error("{caller} may not change roles on {document}")]
    Unauthorized {
        caller: Principal,
        document: DocumentHash,
    },

    #[error("master of {document} cannot hold the {role} role")]
    MasterIsStructural { document: DocumentHash, role: Role },

    #[error("event changes nothing: {role} {principal} on {document}")]
    Ineffective {
        document: DocumentHash,
        role: Role,
        principal: Principal,
    },
}

/// Validation errors for event structure and chain integrity.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("invalid sequence number: expected {expected}, got {got}")]
    InvalidSequence { expected: u64, got: u64 },

    #[error("invalid prev_event_id: expected {expected:?}, got {got:?}")]
    InvalidPrevEvent {
        expected: Option<EventId>,
        got: Option<EventId>,
    },

    #[error("illegal transition at seq {seq}: {source}")]
    IllegalTransition {
        seq: u64,
        #[source]
        source: StateError,
    },

    #[error("event at seq {seq} was not authorized: caller {caller} on {document}")]
    UnauthorizedEvent {
        seq: u64,
        caller: Principal,
        document: DocumentHash,
    },

    #[error("log head mismatch: expected {expected:?}, got {got:?}")]
    HeadMismatch {
        expected: Option<EventId>,
        got: Option<EventId>,
    },

    #[error("snapshot does not match replayed log: {0}")]
    SnapshotMismatch(String),

    #[error("structural error: {0}")]
    StructuralError(String),
}

impl From<CoreError> for ValidationError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnsupportedVersion(v) => ValidationError::UnsupportedVersion(v),
            CoreError::MalformedEvent(msg) => ValidationError::StructuralError(msg),
            CoreError::DecodingError(msg) => ValidationError::StructuralError(msg),
        }
    }
}
