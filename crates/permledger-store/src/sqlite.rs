//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for Permledger. It uses rusqlite with
//! bundled SQLite. Every append runs in a single transaction, so the log and
//! the registry/role snapshot can never disagree after a crash.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};

use permledger_core::{
    check_transition, decode_event, validate_link, Document, DocumentHash, EventId, LedgerAction,
    LedgerEvent, LedgerState, LogHead, Principal, Registry, Role, RoleStore, TransitionFacts,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{AppendResult, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file (and missing parent directories) and runs migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        tracing::debug!(path = %path.display(), "opened sqlite store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute a blocking operation on the connection.
    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        f(&conn)
    }

    /// Execute a blocking operation that needs mutable access.
    fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        f(&mut conn)
    }
}

fn blob_32(bytes: Vec<u8>, column: &str) -> Result<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|_| StoreError::InvalidData(format!("{} is not 32 bytes", column)))
}

fn role_from_sql(code: i64) -> Result<Role> {
    u8::try_from(code)
        .ok()
        .and_then(Role::from_u8)
        .ok_or_else(|| StoreError::InvalidData(format!("unknown role code {}", code)))
}

// Helper to turn a stored (event_id, canonical_bytes) pair back into an event.
//
// The canonical bytes are authoritative; the id column must match them.
fn decode_stored(event_id: Vec<u8>, canonical: Vec<u8>) -> Result<LedgerEvent> {
    let event = decode_event(&canonical).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let stored_id = EventId(blob_32(event_id, "event_id")?);
    if stored_id != event.compute_id() {
        return Err(StoreError::InvalidData(format!(
            "event at seq {} does not hash to its stored id",
            event.seq
        )));
    }
    Ok(event)
}

fn query_events(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<LedgerEvent>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, canonical)| decode_stored(id, canonical))
        .collect()
}

fn read_head(conn: &Connection) -> Result<Option<LogHead>> {
    let row: Option<(i64, Vec<u8>)> = conn
        .query_row(
            "SELECT seq, event_id FROM events ORDER BY seq DESC LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    row.map(|(seq, id)| {
        Ok(LogHead {
            seq: seq as u64,
            event_id: EventId(blob_32(id, "event_id")?),
        })
    })
    .transpose()
}

fn read_master(conn: &Connection, hash: &DocumentHash) -> Result<Option<Principal>> {
    let master: Option<Vec<u8>> = conn
        .query_row(
            "SELECT master FROM documents WHERE hash = ?1",
            params![hash.0.as_slice()],
            |row| row.get(0),
        )
        .optional()?;
    master.map(|m| Ok(Principal(blob_32(m, "master")?))).transpose()
}

fn read_membership(
    conn: &Connection,
    hash: &DocumentHash,
    role: Role,
    principal: &Principal,
) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM roles WHERE hash = ?1 AND role = ?2 AND principal = ?3",
            params![hash.0.as_slice(), role.to_u8() as i64, principal.0.as_slice()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

impl Store for SqliteStore {
    fn append(&self, event: &LedgerEvent) -> Result<AppendResult> {
        let event_id = event.compute_id();
        let canonical = permledger_core::canonical_bytes(event);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let head = read_head(&tx)?;

            // Position already taken: same event is idempotent, different is a conflict
            if let Some(h) = head {
                if event.seq >= 1 && event.seq <= h.seq {
                    let existing: Vec<u8> = tx.query_row(
                        "SELECT event_id FROM events WHERE seq = ?1",
                        params![event.seq as i64],
                        |row| row.get(0),
                    )?;
                    let existing = EventId(blob_32(existing, "event_id")?);
                    return Ok(if existing == event_id {
                        AppendResult::AlreadyExists(existing)
                    } else {
                        AppendResult::Conflict { existing }
                    });
                }
            }

            validate_link(event, head.as_ref())?;

            // Authority and effect are judged against rows read in this
            // transaction, so another handle on the same file cannot race us.
            let document = event.document();
            let mut caller_administers = false;
            for role in Role::ALL.into_iter().filter(|r| r.can_administer()) {
                caller_administers |= read_membership(&tx, document, role, &event.caller)?;
            }
            let facts = TransitionFacts {
                master: read_master(&tx, document)?,
                caller_administers,
                target_is_member: match (event.action.role(), event.action.principal()) {
                    (Some(role), Some(principal)) => {
                        read_membership(&tx, document, role, principal)?
                    }
                    _ => false,
                },
            };
            check_transition(&event.caller, &event.action, facts)?;

            tx.execute(
                "INSERT INTO events (
                    seq, event_id, prev_event_id, caller, timestamp, action,
                    document, role, principal, canonical_bytes
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    event.seq as i64,
                    event_id.0.as_slice(),
                    event.prev_event_id.as_ref().map(|id| id.0.as_slice()),
                    event.caller.0.as_slice(),
                    event.timestamp,
                    event.kind().to_u8() as i64,
                    document.0.as_slice(),
                    event.action.role().map(|r| r.to_u8() as i64),
                    event.action.principal().map(|p| p.0.as_slice()),
                    canonical.as_slice(),
                ],
            )?;

            match &event.action {
                LedgerAction::Register { document } => {
                    tx.execute(
                        "INSERT INTO documents (hash, master, registered_at_seq)
                         VALUES (?1, ?2, ?3)",
                        params![
                            document.0.as_slice(),
                            event.caller.0.as_slice(),
                            event.seq as i64
                        ],
                    )?;
                }
                LedgerAction::Grant {
                    document,
                    role,
                    principal,
                } => {
                    tx.execute(
                        "INSERT INTO roles (hash, role, principal) VALUES (?1, ?2, ?3)",
                        params![
                            document.0.as_slice(),
                            role.to_u8() as i64,
                            principal.0.as_slice()
                        ],
                    )?;
                }
                LedgerAction::Revoke {
                    document,
                    role,
                    principal,
                } => {
                    tx.execute(
                        "DELETE FROM roles WHERE hash = ?1 AND role = ?2 AND principal = ?3",
                        params![
                            document.0.as_slice(),
                            role.to_u8() as i64,
                            principal.0.as_slice()
                        ],
                    )?;
                }
            }

            tx.commit()?;
            tracing::debug!(seq = event.seq, id = %event_id, "appended event");
            Ok(AppendResult::Appended(event_id))
        })
    }

    fn head(&self) -> Result<Option<LogHead>> {
        self.with_conn(read_head)
    }

    fn get_event(&self, seq: u64) -> Result<Option<LedgerEvent>> {
        self.with_conn(|conn| {
            let row: Option<(Vec<u8>, Vec<u8>)> = conn
                .query_row(
                    "SELECT event_id, canonical_bytes FROM events WHERE seq = ?1",
                    params![seq as i64],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            row.map(|(id, canonical)| decode_stored(id, canonical))
                .transpose()
        })
    }

    fn events_range(&self, start: u64, end: u64) -> Result<Vec<LedgerEvent>> {
        self.with_conn(|conn| {
            query_events(
                conn,
                "SELECT event_id, canonical_bytes FROM events
                 WHERE seq >= ?1 AND seq <= ?2 ORDER BY seq",
                &[&(start as i64), &(end.min(i64::MAX as u64) as i64)],
            )
        })
    }

    fn events_for_document(&self, hash: &DocumentHash) -> Result<Vec<LedgerEvent>> {
        self.with_conn(|conn| {
            query_events(
                conn,
                "SELECT event_id, canonical_bytes FROM events
                 WHERE document = ?1 ORDER BY seq",
                &[&hash.0.as_slice()],
            )
        })
    }

    fn get_document(&self, hash: &DocumentHash) -> Result<Option<Document>> {
        self.with_conn(|conn| {
            let row: Option<(Vec<u8>, i64)> = conn
                .query_row(
                    "SELECT master, registered_at_seq FROM documents WHERE hash = ?1",
                    params![hash.0.as_slice()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            row.map(|(master, seq)| {
                Ok(Document {
                    hash: *hash,
                    master: Principal(blob_32(master, "master")?),
                    registered_at_seq: seq as u64,
                })
            })
            .transpose()
        })
    }

    fn documents_by_master(&self, master: &Principal) -> Result<Vec<DocumentHash>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT hash FROM documents WHERE master = ?1 ORDER BY hash")?;
            let rows = stmt
                .query_map(params![master.0.as_slice()], |row| row.get::<_, Vec<u8>>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|h| Ok(DocumentHash(blob_32(h, "hash")?)))
                .collect()
        })
    }

    fn is_member(&self, hash: &DocumentHash, role: Role, principal: &Principal) -> Result<bool> {
        self.with_conn(|conn| read_membership(conn, hash, role, principal))
    }

    fn members(&self, hash: &DocumentHash, role: Role) -> Result<Vec<Principal>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT principal FROM roles WHERE hash = ?1 AND role = ?2 ORDER BY principal",
            )?;
            let rows = stmt
                .query_map(params![hash.0.as_slice(), role.to_u8() as i64], |row| {
                    row.get::<_, Vec<u8>>(0)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|p| Ok(Principal(blob_32(p, "principal")?)))
                .collect()
        })
    }

    fn snapshot(&self) -> Result<LedgerState> {
        self.with_conn(|conn| {
            let mut registry = Registry::new();
            let mut stmt =
                conn.prepare("SELECT hash, master, registered_at_seq FROM documents")?;
            let documents = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            for (hash, master, seq) in documents {
                registry.register(
                    DocumentHash(blob_32(hash, "hash")?),
                    Principal(blob_32(master, "master")?),
                    seq as u64,
                )?;
            }

            let mut roles = RoleStore::new();
            let mut stmt = conn.prepare("SELECT hash, role, principal FROM roles")?;
            let assignments = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            for (hash, role, principal) in assignments {
                roles.grant(
                    DocumentHash(blob_32(hash, "hash")?),
                    role_from_sql(role)?,
                    Principal(blob_32(principal, "principal")?),
                );
            }

            Ok(LedgerState::from_parts(registry, roles))
        })
    }
}
