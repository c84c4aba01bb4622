//! # Permledger Store
//!
//! Storage abstraction for Permledger. Provides a trait-based interface for
//! ledger persistence with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! A store keeps the hash-chained event log together with the registry and
//! role snapshot that the log produces. The only write is
//! [`Store::append`], which links, checks and applies one event atomically.
//!
//! ## Key Types
//!
//! - [`Store`] - The trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests and replay
//! - [`AppendResult`] - Result of appending an event
//!
//! ## Usage
//!
//! ```rust,no_run
//! use permledger_core::{DocumentHash, EventBuilder, LedgerAction, Principal};
//! use permledger_store::{AppendResult, SqliteStore, Store};
//!
//! let store = SqliteStore::open("ledger.db").unwrap();
//! let head = store.head().unwrap();
//!
//! let event = EventBuilder::new(
//!     Principal::from_bytes([1; 32]),
//!     LedgerAction::Register { document: DocumentHash::of(b"contract.pdf") },
//! )
//! .after(head.as_ref())
//! .build();
//!
//! assert!(matches!(store.append(&event).unwrap(), AppendResult::Appended(_)));
//! ```

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AppendResult, Store, StoreExt};
