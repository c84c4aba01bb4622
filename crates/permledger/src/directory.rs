//! Read-only view of the document registry for consuming components.
//!
//! A notarization service attaches records to registered documents only. It
//! needs two facts from this crate, existence and mastership, and must never
//! be able to change permissions. [`DocumentDirectory`] is that seam.

use std::sync::Arc;

use permledger_core::{DocumentHash, Principal};
use permledger_store::Store;

use crate::error::Result;
use crate::manager::PermissionManager;

/// Existence and mastership lookups.
pub trait DocumentDirectory: Send + Sync {
    /// Whether `hash` is registered.
    fn exists(&self, hash: &DocumentHash) -> Result<bool>;

    /// The master of `hash`, if registered.
    fn master_of(&self, hash: &DocumentHash) -> Result<Option<Principal>>;
}

impl<S: Store> DocumentDirectory for PermissionManager<S> {
    fn exists(&self, hash: &DocumentHash) -> Result<bool> {
        PermissionManager::exists(self, hash)
    }

    fn master_of(&self, hash: &DocumentHash) -> Result<Option<Principal>> {
        PermissionManager::master_of(self, hash)
    }
}

impl<T: DocumentDirectory + ?Sized> DocumentDirectory for Arc<T> {
    fn exists(&self, hash: &DocumentHash) -> Result<bool> {
        (**self).exists(hash)
    }

    fn master_of(&self, hash: &DocumentHash) -> Result<Option<Principal>> {
        (**self).master_of(hash)
    }
}
