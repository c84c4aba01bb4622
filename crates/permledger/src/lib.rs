//! # Permledger
//!
//! Role-based permission management over immutable, content-addressed
//! documents, backed by a tamper-evident ledger.
//!
//! ## Overview
//!
//! - **Documents** are registered once by hash. The registering principal
//!   becomes the document's master, forever.
//! - **Roles** (Owner, Writer, Reader) are delegated and removed by the
//!   master or by any Owner. Nobody else may touch membership.
//! - **Every change** is one event in an append-only, hash-chained log.
//!   Replaying the log reproduces the current state exactly.
//!
//! ## Usage
//!
//! ```rust
//! use permledger::{ManagerConfig, PermissionManager, PermissionError};
//! use permledger::core::{DocumentHash, Keypair};
//! use permledger::store::MemoryStore;
//!
//! let manager = PermissionManager::new(MemoryStore::new(), ManagerConfig::default());
//! let master = Keypair::from_seed(&[1; 32]).principal();
//! let owner = Keypair::from_seed(&[2; 32]).principal();
//! let stranger = Keypair::from_seed(&[3; 32]).principal();
//! let hash = DocumentHash::of(b"contract.pdf");
//!
//! manager.new_document(&master, &hash).unwrap();
//! manager.delegate_permanent_owner(&master, &owner, &hash).unwrap();
//! assert!(manager.is_owner(&owner, &hash).unwrap());
//!
//! let denied = manager.delegate_permanent_read(&stranger, &stranger, &hash);
//! assert!(matches!(denied, Err(PermissionError::Unauthorized { .. })));
//! ```
//!
//! ## Re-exports
//!
//! - `permledger::core` - Core primitives (DocumentHash, Principal, LedgerEvent, etc.)
//! - `permledger::store` - Storage abstraction and SQLite

pub mod directory;
pub mod error;
pub mod gate;
pub mod manager;

// Re-export component crates
pub use permledger_core as core;
pub use permledger_store as store;

// Re-export main types for convenience
pub use directory::DocumentDirectory;
pub use error::{PermissionError, Result};
pub use gate::{authorize, Action, Authority, RoleChange};
pub use manager::{ManagerConfig, MutationOutcome, PermissionManager, VerificationReport};

// Re-export commonly used core types
pub use permledger_core::{DocumentHash, EventId, Keypair, LedgerEvent, LogHead, Principal, Role};
