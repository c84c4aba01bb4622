//! Document registry: which hashes are registered, and by whom.
//!
//! A document is created exactly once and never deleted. Its creator becomes
//! the master, and that never changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::StateError;
use crate::types::{DocumentHash, Principal};

/// A registered document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// The content hash identifying the document.
    pub hash: DocumentHash,

    /// The creator and ultimate administrator.
    pub master: Principal,

    /// Ledger sequence number of the registration event.
    pub registered_at_seq: u64,
}

/// In-memory document registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    documents: BTreeMap<DocumentHash, Document>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document with `creator` as its master.
    ///
    /// Re-registration is refused, never treated as a reset.
    pub fn register(
        &mut self,
        hash: DocumentHash,
        creator: Principal,
        seq: u64,
    ) -> Result<(), StateError> {
        if self.documents.contains_key(&hash) {
            return Err(StateError::AlreadyExists(hash));
        }
        self.documents.insert(
            hash,
            Document {
                hash,
                master: creator,
                registered_at_seq: seq,
            },
        );
        Ok(())
    }

    /// Whether `hash` is registered.
    pub fn exists(&self, hash: &DocumentHash) -> bool {
        self.documents.contains_key(hash)
    }

    /// The master of `hash`, if registered.
    pub fn master_of(&self, hash: &DocumentHash) -> Option<Principal> {
        self.documents.get(hash).map(|d| d.master)
    }

    /// Get a document record.
    pub fn get(&self, hash: &DocumentHash) -> Option<&Document> {
        self.documents.get(hash)
    }

    /// All documents mastered by `master`, in hash order.
    pub fn documents_by(&self, master: &Principal) -> Vec<DocumentHash> {
        self.documents
            .values()
            .filter(|d| &d.master == master)
            .map(|d| d.hash)
            .collect()
    }

    /// Iterate over all documents in hash order.
    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    /// Number of registered documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether no document is registered.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
