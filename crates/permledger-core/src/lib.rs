//! # Permledger Core
//!
//! Pure primitives for Permledger: documents, roles, ledger events, and
//! canonicalization.
//!
//! This crate contains no I/O and no storage. Permission state is expressed
//! as an append-only log of events that is replayed to compute the current
//! registry and role membership.
//!
//! ## Key Types
//!
//! - [`DocumentHash`] - Content hash identifying a document
//! - [`Principal`] - Opaque caller identity
//! - [`Role`] - Owner, Writer or Reader
//! - [`LedgerEvent`] - One recorded permission change, hash-chained to its predecessor
//! - [`LedgerState`] - Registry plus role membership, computed from events
//!
//! ## Canonicalization
//!
//! All events are encoded using deterministic CBOR. See [`canonical`] module.

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod event;
pub mod registry;
pub mod role;
pub mod roles;
pub mod state;
pub mod types;
pub mod validation;

pub use canonical::{canonical_bytes, decode_event};
pub use crypto::Keypair;
pub use error::{CoreError, StateError, ValidationError};
pub use event::{ActionKind, EventBuilder, LedgerAction, LedgerEvent, LogHead, EVENT_VERSION};
pub use registry::{Document, Registry};
pub use role::Role;
pub use roles::{RoleAssignment, RoleStore};
pub use state::{check_transition, LedgerState, TransitionFacts};
pub use types::{DocumentHash, EventId, Principal};
pub use validation::{validate_event_structure, validate_link, verify_chain};
