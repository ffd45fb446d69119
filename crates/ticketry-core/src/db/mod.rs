//! SQLite ticket store.
//!
//! Connections are configured the same way everywhere:
//! - `journal_mode = WAL` so readers never block the single writer
//! - `busy_timeout` (default 5s) so concurrent processes wait instead of failing
//! - `foreign_keys = ON` so comment and history rows follow their ticket

pub mod migrations;
pub mod schema;
pub mod store;

pub use store::SqliteStore;

use rusqlite::Connection;
use std::{path::Path, time::Duration};

use crate::error::{SqlResultExt, StoreError};

/// Busy timeout used for store connections unless configured otherwise.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the store database, apply runtime pragmas, and migrate
/// the schema to the latest version.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created or opening,
/// configuring, or migrating the database fails.
pub fn open_connection(path: &Path, busy_timeout: Duration) -> Result<Connection, StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut conn = Connection::open(path).op("open store database")?;
    configure_connection(&conn, busy_timeout).op("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).op("apply store migrations")?;
    tracing::debug!(path = %path.display(), "opened ticket store");

    Ok(conn)
}

/// Open a private in-memory store with the full schema applied.
///
/// # Errors
///
/// Returns an error if SQLite cannot allocate the database or migrate it.
pub fn open_memory_connection() -> Result<Connection, StoreError> {
    let mut conn = Connection::open_in_memory().op("open in-memory store")?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .op("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).op("apply store migrations")?;
    Ok(conn)
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_BUSY_TIMEOUT, open_connection};
    use crate::db::migrations;
    use std::time::Duration;
    use tempfile::TempDir;

    fn temp_db_path() -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join("tickets.sqlite3");
        (dir, path)
    }

    #[test]
    fn open_sets_wal_busy_timeout_and_fk() {
        let (_dir, path) = temp_db_path();
        let conn = open_connection(&path, DEFAULT_BUSY_TIMEOUT).expect("open store db");

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("query journal_mode");
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let busy_timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(
            u128::from(busy_timeout_ms),
            DEFAULT_BUSY_TIMEOUT.as_millis()
        );

        let foreign_keys: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("query foreign_keys");
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn custom_busy_timeout_is_applied() {
        let (_dir, path) = temp_db_path();
        let conn = open_connection(&path, Duration::from_millis(250)).expect("open store db");
        let busy_timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(busy_timeout_ms, 250);
    }

    #[test]
    fn open_runs_migrations_and_seeds_counter() {
        let (_dir, path) = temp_db_path();
        let conn = open_connection(&path, DEFAULT_BUSY_TIMEOUT).expect("open store db");

        let version = migrations::current_schema_version(&conn).expect("schema version query");
        assert_eq!(version, migrations::LATEST_SCHEMA_VERSION);

        let next: i64 = conn
            .query_row(
                "SELECT next FROM counters WHERE name = 'tickets'",
                [],
                |row| row.get(0),
            )
            .expect("ticket counter row");
        assert_eq!(next, 0);
    }
}
