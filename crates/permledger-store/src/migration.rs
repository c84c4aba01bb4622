//! Versioned SQLite schema.
//!
//! `MIGRATIONS[i]` moves the schema from version `i` to `i + 1`. Applied
//! versions are recorded in `schema_migrations`; a database written by a
//! newer build is refused rather than guessed at.

use rusqlite::{params, Connection};

use crate::error::{Result, StoreError};

/// Forward migrations, oldest first.
const MIGRATIONS: &[&str] = &[SCHEMA_V1];

/// Schema version this build writes.
pub const CURRENT_VERSION: u32 = MIGRATIONS.len() as u32;

/// Bring `conn` up to [`CURRENT_VERSION`]. Safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        );",
    )?;

    let found = schema_version(conn)?;
    if found > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "schema version {} is newer than this build ({})",
            found, CURRENT_VERSION
        )));
    }
    if found == CURRENT_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (index, sql) in MIGRATIONS.iter().enumerate().skip(found as usize) {
        let version = index as u32 + 1;
        tx.execute_batch(sql)
            .map_err(|e| StoreError::Migration(format!("v{}: {}", version, e)))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, now_millis()],
        )?;
        tracing::info!(version, "applied schema migration");
    }
    tx.commit()?;
    Ok(())
}

/// Highest applied schema version, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?)
}

/// The event log plus the registry and role snapshot it produces.
const SCHEMA_V1: &str = r#"
    -- Append-only, hash-chained event log
    CREATE TABLE events (
        seq INTEGER PRIMARY KEY,          -- 1-indexed, contiguous
        event_id BLOB NOT NULL UNIQUE,    -- 32 bytes, Blake3 of canonical bytes
        prev_event_id BLOB,               -- 32 bytes, NULL for seq=1
        caller BLOB NOT NULL,             -- 32 bytes
        timestamp INTEGER NOT NULL,       -- Unix ms, informational
        action INTEGER NOT NULL,          -- ActionKind as u8
        document BLOB NOT NULL,           -- 32 bytes
        role INTEGER,                     -- Role as u8, NULL for register
        principal BLOB,                   -- 32 bytes, NULL for register
        canonical_bytes BLOB NOT NULL     -- authoritative encoding
    );

    CREATE TABLE documents (
        hash BLOB PRIMARY KEY,
        master BLOB NOT NULL,
        registered_at_seq INTEGER NOT NULL REFERENCES events(seq)
    );

    CREATE TABLE roles (
        hash BLOB NOT NULL REFERENCES documents(hash),
        role INTEGER NOT NULL,
        principal BLOB NOT NULL,
        PRIMARY KEY (hash, role, principal)
    );

    CREATE INDEX idx_events_document ON events(document, seq);
    CREATE INDEX idx_documents_master ON documents(master);
"#;

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"events".to_string()));
        assert!(tables.contains(&"documents".to_string()));
        assert!(tables.contains(&"roles".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
        let rows: u32 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, CURRENT_VERSION);
    }

    #[test]
    fn test_refuses_newer_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (99, 0)",
            [],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
