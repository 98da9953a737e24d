//! Database schema migrations for SQLite.
//!
//! Each migration is a SQL batch that moves the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, crate::now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "schema migrated");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: ledgers and the object key/value table.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE ledgers (
            zone_id INTEGER NOT NULL,
            ledger_id TEXT NOT NULL,          -- dashless uuid
            name TEXT NOT NULL,
            ref TEXT NOT NULL,                -- head commit oid, 64 hex chars
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,

            PRIMARY KEY (zone_id, ledger_id),
            UNIQUE (zone_id, name)
        );

        -- Content-addressed objects, keyed by oid hex
        CREATE TABLE key_values (
            zone_id INTEGER NOT NULL,
            kv_key TEXT NOT NULL,
            kv_value BLOB NOT NULL,

            PRIMARY KEY (zone_id, kv_key)
        );
        "#,
    )?;

    Ok(())
}
