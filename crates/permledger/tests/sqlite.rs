//! Persistence and tamper detection on the SQLite backend.

use std::path::Path;

use rusqlite::{params, Connection};

use permledger::core::{canonical_bytes, EventBuilder, LedgerAction, StateError, ValidationError};
use permledger::store::{SqliteStore, Store, StoreError, StoreExt};
use permledger::{DocumentHash, ManagerConfig, PermissionError, PermissionManager, Role};
use permledger_testkit::fixtures::{sqlite_manager, Cast};

/// Register a document and hand out one of each role.
fn populate(path: &Path, cast: &Cast, hash: &DocumentHash) {
    let manager = sqlite_manager(path).unwrap();
    manager.new_document(&cast.master, hash).unwrap();
    manager.delegate_permanent_owner(&cast.master, &cast.owner, hash).unwrap();
    manager.delegate_permanent_write(&cast.owner, &cast.writer, hash).unwrap();
    manager.delegate_permanent_read(&cast.owner, &cast.reader, hash).unwrap();
}

#[test]
fn reopened_ledger_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let cast = Cast::new();
    let hash = DocumentHash::of(b"persisted");

    populate(&path, &cast, &hash);
    let (snapshot, events) = {
        let store = SqliteStore::open(&path).unwrap();
        (store.snapshot().unwrap(), store.all_events().unwrap())
    };

    let manager = sqlite_manager(&path).unwrap();
    assert_eq!(manager.store().snapshot().unwrap(), snapshot);
    assert_eq!(manager.store().all_events().unwrap(), events);
    assert_eq!(manager.master_of(&hash).unwrap(), Some(cast.master));
    assert!(manager.is_writer(&cast.writer, &hash).unwrap());
    assert_eq!(manager.documents_of(&cast.master).unwrap(), vec![hash]);

    // The reopened ledger keeps extending the same chain.
    manager.remove_permanent_read(&cast.master, &cast.reader, &hash).unwrap();
    assert_eq!(manager.head().unwrap().map(|h| h.seq), Some(5));
    assert_eq!(manager.verify_ledger().unwrap().events, 5);
}

#[test]
fn sqlite_and_memory_agree() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let cast = Cast::new();
    let hash = DocumentHash::of(b"agree");
    populate(&path, &cast, &hash);

    let store = SqliteStore::open(&path).unwrap();
    let memory = permledger::store::MemoryStore::new();
    for event in store.all_events().unwrap() {
        memory.append(&event).unwrap();
    }
    assert_eq!(memory.snapshot().unwrap(), store.snapshot().unwrap());
    assert_eq!(memory.head().unwrap(), store.head().unwrap());
}

#[test]
fn removed_role_row_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let cast = Cast::new();
    let hash = DocumentHash::of(b"tamper-roles");
    populate(&path, &cast, &hash);

    let conn = Connection::open(&path).unwrap();
    let deleted = conn
        .execute(
            "DELETE FROM roles WHERE hash = ?1 AND role = ?2",
            params![&hash.0[..], Role::Writer.to_u8()],
        )
        .unwrap();
    assert_eq!(deleted, 1);
    drop(conn);

    let err = sqlite_manager(&path).err().unwrap();
    assert!(matches!(
        err,
        PermissionError::Validation(ValidationError::SnapshotMismatch(_))
    ));

    // Without verification the manager opens and serves the tampered state.
    let store = SqliteStore::open(&path).unwrap();
    let manager = PermissionManager::open(
        store,
        ManagerConfig {
            verify_on_open: false,
            ..ManagerConfig::default()
        },
    )
    .unwrap();
    assert!(!manager.is_writer(&cast.writer, &hash).unwrap());
    assert!(manager.verify_ledger().is_err());
}

#[test]
fn rewritten_event_bytes_are_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let cast = Cast::new();
    let hash = DocumentHash::of(b"tamper-events");
    populate(&path, &cast, &hash);

    // Swap the encoding of event 3 for that of event 4.
    let conn = Connection::open(&path).unwrap();
    conn.execute(
        "UPDATE events SET canonical_bytes = (SELECT canonical_bytes FROM events WHERE seq = 4)
         WHERE seq = 3",
        [],
    )
    .unwrap();
    drop(conn);

    let err = sqlite_manager(&path).err().unwrap();
    assert!(matches!(
        err,
        PermissionError::Store(StoreError::InvalidData(_))
    ));
}

#[test]
fn forged_grant_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let cast = Cast::new();
    let hash = DocumentHash::of(b"forged");
    populate(&path, &cast, &hash);

    // A well-formed, correctly linked event from a stranger still fails:
    // the store checks the caller's authority inside the append.
    {
        let store = SqliteStore::open(&path).unwrap();
        let head = store.head().unwrap();
        let forged = EventBuilder::new(
            cast.stranger,
            LedgerAction::Grant {
                document: hash,
                role: Role::Owner,
                principal: cast.stranger,
            },
        )
        .after(head.as_ref())
        .build();
        let err = store.append(&forged).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidEvent(StateError::Unauthorized { caller, document })
                if caller == cast.stranger && document == hash
        ));
        assert_eq!(store.head().unwrap(), head);
    }

    let manager = sqlite_manager(&path).unwrap();
    assert!(!manager.is_owner(&cast.stranger, &hash).unwrap());
    assert_eq!(manager.verify_ledger().unwrap().events, 4);
}

#[test]
fn forged_rows_are_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let cast = Cast::new();
    let hash = DocumentHash::of(b"forged-rows");
    populate(&path, &cast, &hash);

    let head = SqliteStore::open(&path).unwrap().head().unwrap();
    let forged = EventBuilder::new(
        cast.stranger,
        LedgerAction::Grant {
            document: hash,
            role: Role::Owner,
            principal: cast.stranger,
        },
    )
    .after(head.as_ref())
    .build();

    // Write the event and its effect behind the store's back.
    let conn = Connection::open(&path).unwrap();
    conn.execute(
        "INSERT INTO events (
            seq, event_id, prev_event_id, caller, timestamp, action,
            document, role, principal, canonical_bytes
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            forged.seq as i64,
            &forged.compute_id().0[..],
            forged.prev_event_id.as_ref().map(|id| id.0.to_vec()),
            &cast.stranger.0[..],
            forged.timestamp,
            forged.kind().to_u8() as i64,
            &hash.0[..],
            Role::Owner.to_u8() as i64,
            &cast.stranger.0[..],
            canonical_bytes(&forged),
        ],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO roles (hash, role, principal) VALUES (?1, ?2, ?3)",
        params![&hash.0[..], Role::Owner.to_u8() as i64, &cast.stranger.0[..]],
    )
    .unwrap();
    drop(conn);

    let err = sqlite_manager(&path).err().unwrap();
    assert!(matches!(
        err,
        PermissionError::Validation(ValidationError::UnauthorizedEvent { seq: 5, caller, .. })
            if caller == cast.stranger
    ));
}

#[test]
fn revoked_owner_is_refused_through_another_handle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let cast = Cast::new();
    let hash = DocumentHash::of(b"two-handles");
    populate(&path, &cast, &hash);

    // Two managers over the same file, each with its own write lock.
    let first = sqlite_manager(&path).unwrap();
    let second = sqlite_manager(&path).unwrap();
    first.remove_permanent_owner(&cast.master, &cast.owner, &hash).unwrap();

    let denied = second.delegate_permanent_owner(&cast.owner, &cast.stranger, &hash);
    assert!(matches!(
        denied,
        Err(PermissionError::Unauthorized { caller, .. }) if caller == cast.owner
    ));

    // A raw handle that skips the manager's checks is refused by the store.
    let store = SqliteStore::open(&path).unwrap();
    let head = store.head().unwrap();
    let stale = EventBuilder::new(
        cast.owner,
        LedgerAction::Grant {
            document: hash,
            role: Role::Owner,
            principal: cast.stranger,
        },
    )
    .after(head.as_ref())
    .build();
    assert!(matches!(
        store.append(&stale),
        Err(StoreError::InvalidEvent(StateError::Unauthorized { .. }))
    ));
    drop(store);

    // Both managers still see one consistent, verifiable ledger.
    assert_eq!(first.head().unwrap(), second.head().unwrap());
    assert_eq!(second.verify_ledger().unwrap().events, 5);
    assert!(sqlite_manager(&path).is_ok());
}
