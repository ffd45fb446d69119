//! SQLite schema migrations for the ticket store.

use super::schema;
use rusqlite::{Connection, TransactionBehavior, types::Type};

/// Latest schema version understood by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

const MIGRATIONS: &[(u32, &str)] = &[(1, schema::MIGRATION_V1_SQL), (2, schema::MIGRATION_V2_SQL)];

/// Read `PRAGMA user_version` and convert it to a Rust `u32`.
///
/// # Errors
///
/// Returns an error if querying SQLite fails or the version value cannot be
/// represented as `u32`.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Apply all pending migrations in ascending order.
///
/// Each migration runs in an immediate transaction and only when its version
/// exceeds `user_version` as read inside that transaction, so processes that
/// open the same file concurrently apply it once.
///
/// # Errors
///
/// Returns an error if any migration fails.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let mut current = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if current_schema_version(&tx)? >= *version {
            current = *version;
            continue;
        }
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", i64::from(*version))?;
        tx.execute(
            "UPDATE store_meta SET schema_version = ?1 WHERE id = 1",
            [i64::from(*version)],
        )?;
        tx.commit()?;
        tracing::debug!(version, "applied ticket store migration");
        current = *version;
    }

    Ok(current)
}
