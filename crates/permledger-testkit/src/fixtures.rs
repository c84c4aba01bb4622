//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::path::Path;

use permledger::{ManagerConfig, PermissionManager};
use permledger_core::{DocumentHash, Keypair, Principal};
use permledger_store::{MemoryStore, SqliteStore, StoreError};

/// The document hash registered by the original acceptance sequence, as
/// submitted by contract tooling: 31 bytes, right-padded to 32.
pub const ACCEPTANCE_DOCUMENT_HEX: &str =
    "0x38626630313632393933366636616133303132646561616662663865323164";

/// Parse [`ACCEPTANCE_DOCUMENT_HEX`].
pub fn acceptance_document() -> Result<DocumentHash, hex::FromHexError> {
    DocumentHash::parse_bytes32(ACCEPTANCE_DOCUMENT_HEX)
}

/// A random document hash.
pub fn random_document() -> DocumentHash {
    DocumentHash::from_bytes(rand::random())
}

/// Deterministic principal from a one-byte seed.
pub fn principal(seed: u8) -> Principal {
    Keypair::from_seed(&[seed; 32]).principal()
}

/// The four accounts of the acceptance sequence plus an outsider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cast {
    pub master: Principal,
    pub owner: Principal,
    pub writer: Principal,
    pub reader: Principal,
    pub stranger: Principal,
}

impl Cast {
    /// The standard cast, derived from fixed seeds.
    pub fn new() -> Self {
        Self {
            master: principal(1),
            owner: principal(2),
            writer: principal(3),
            reader: principal(4),
            stranger: principal(5),
        }
    }

    /// Everyone, in seed order.
    pub fn all(&self) -> [Principal; 5] {
        [
            self.master,
            self.owner,
            self.writer,
            self.reader,
            self.stranger,
        ]
    }
}

impl Default for Cast {
    fn default() -> Self {
        Self::new()
    }
}

/// A test fixture with a cast and an in-memory permission manager.
pub struct TestFixture {
    pub cast: Cast,
    pub manager: PermissionManager<MemoryStore>,
}

impl TestFixture {
    /// Create a fixture over an empty memory store.
    pub fn new() -> Self {
        Self {
            cast: Cast::new(),
            manager: PermissionManager::new(MemoryStore::new(), ManagerConfig::default()),
        }
    }

    /// Create a fixture where the master has already registered `hash`.
    pub fn with_document(hash: &DocumentHash) -> permledger::Result<Self> {
        let fixture = Self::new();
        fixture.manager.new_document(&fixture.cast.master, hash)?;
        Ok(fixture)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Open a SQLite-backed manager at `path`, verifying any existing ledger.
pub fn sqlite_manager(path: &Path) -> permledger::Result<PermissionManager<SqliteStore>> {
    let store = SqliteStore::open(path)?;
    PermissionManager::open(store, ManagerConfig::default())
}

/// Open a raw SQLite store at `path`.
pub fn sqlite_store(path: &Path) -> Result<SqliteStore, StoreError> {
    SqliteStore::open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use permledger_store::Store;

    #[test]
    fn test_cast_is_distinct() {
        let cast = Cast::new();
        let all = cast.all();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(cast, Cast::new());
    }

    #[test]
    fn test_acceptance_document_padding() {
        let hash = acceptance_document().unwrap();
        assert_eq!(hash.as_bytes()[31], 0);
        assert_eq!(
            hash.to_hex(),
            "3862663031363239393336663661613330313264656161666266386532316400"
        );
    }

    #[test]
    fn test_fixture_with_document() {
        let hash = random_document();
        let fixture = TestFixture::with_document(&hash).unwrap();
        assert_eq!(
            fixture.manager.master_of(&hash).unwrap(),
            Some(fixture.cast.master)
        );
    }

    #[test]
    fn test_sqlite_manager_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let cast = Cast::new();
        let hash = random_document();

        {
            let manager = sqlite_manager(&path).unwrap();
            manager.new_document(&cast.master, &hash).unwrap();
        }

        let manager = sqlite_manager(&path).unwrap();
        assert!(manager.exists(&hash).unwrap());
        assert_eq!(sqlite_store(&path).unwrap().snapshot().unwrap().registry().len(), 1);
    }
}
