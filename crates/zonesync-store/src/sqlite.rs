//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use zonesync_core::{LedgerId, Object, Oid, ZoneId};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::now_millis;
use crate::traits::{
    validate_name, validate_object_key, validate_zone, Ledger, RefTransition, Store,
};

const UPSERT_OBJECT: &str = "INSERT INTO key_values (zone_id, kv_key, kv_value) VALUES (?1, ?2, ?3)
     ON CONFLICT (zone_id, kv_key) DO UPDATE SET kv_value = excluded.kv_value";

const LEDGER_COLUMNS: &str = "zone_id, ledger_id, name, ref, created_at, updated_at";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
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

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

// Helper to convert a row to Ledger
fn row_to_ledger(row: &rusqlite::Row<'_>) -> rusqlite::Result<Ledger> {
    let ledger_id: String = row.get("ledger_id")?;
    let head: String = row.get("ref")?;

    Ok(Ledger {
        zone_id: ZoneId(row.get("zone_id")?),
        ledger_id: ledger_id.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?,
        name: row.get("name")?,
        head: Oid::from_hex(&head).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Commit on success, roll back explicitly on failure.
fn finish<T>(tx: Transaction<'_>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback() {
                tracing::warn!(error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}

/// The ref compare-and-swap, run inside the caller's transaction.
fn swap_ref(
    conn: &Connection,
    zone_id: ZoneId,
    ledger_id: LedgerId,
    expected: Oid,
    new: Oid,
) -> Result<()> {
    let ledger_key = ledger_id.to_simple_string();
    let updated = conn.execute(
        "UPDATE ledgers SET ref = ?1, updated_at = ?2
         WHERE zone_id = ?3 AND ledger_id = ?4 AND ref = ?5",
        params![new.to_hex(), now_millis(), zone_id.0, ledger_key, expected.to_hex()],
    )?;
    if updated == 1 {
        return Ok(());
    }

    let actual: Option<String> = conn
        .query_row(
            "SELECT ref FROM ledgers WHERE zone_id = ?1 AND ledger_id = ?2",
            params![zone_id.0, ledger_key],
            |row| row.get(0),
        )
        .optional()?;
    match actual {
        None => Err(StoreError::LedgerNotFound(ledger_id.to_string())),
        Some(actual) => Err(StoreError::RefMismatch {
            expected,
            actual: Oid::from_hex(&actual).map_err(|e| StoreError::InvalidData(e.to_string()))?,
        }),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_ledger(&self, zone_id: ZoneId, name: &str) -> Result<Ledger> {
        validate_zone(zone_id)?;
        validate_name(name)?;
        let now = now_millis();
        let ledger = Ledger {
            zone_id,
            ledger_id: LedgerId::new_v4(),
            name: name.to_string(),
            head: Oid::ZERO,
            created_at: now,
            updated_at: now,
        };

        let row = ledger.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO ledgers (zone_id, ledger_id, name, ref, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    row.zone_id.0,
                    row.ledger_id.to_simple_string(),
                    row.name,
                    row.head.to_hex(),
                    row.created_at,
                    row.updated_at,
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(f, _)
                    if f.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StoreError::LedgerExists(row.name.clone())
                }
                other => StoreError::Database(other),
            })?;
            Ok(())
        })
        .await?;

        tracing::debug!(zone = %zone_id, ledger = %ledger.ledger_id, name, "ledger created");
        Ok(ledger)
    }

    async fn get_ledger(&self, zone_id: ZoneId, ledger_id: LedgerId) -> Result<Option<Ledger>> {
        validate_zone(zone_id)?;
        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {LEDGER_COLUMNS} FROM ledgers WHERE zone_id = ?1 AND ledger_id = ?2"),
                params![zone_id.0, ledger_id.to_simple_string()],
                row_to_ledger,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_ledger_by_name(&self, zone_id: ZoneId, name: &str) -> Result<Option<Ledger>> {
        validate_zone(zone_id)?;
        let name = name.to_string();
        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {LEDGER_COLUMNS} FROM ledgers WHERE zone_id = ?1 AND name = ?2"),
                params![zone_id.0, name],
                row_to_ledger,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_ledgers(&self, zone_id: ZoneId) -> Result<Vec<Ledger>> {
        validate_zone(zone_id)?;
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LEDGER_COLUMNS} FROM ledgers WHERE zone_id = ?1 ORDER BY name"
            ))?;
            let ledgers = stmt
                .query_map(params![zone_id.0], row_to_ledger)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ledgers)
        })
        .await
    }

    async fn compare_and_swap_ref(
        &self,
        zone_id: ZoneId,
        ledger_id: LedgerId,
        expected: Oid,
        new: Oid,
    ) -> Result<()> {
        validate_zone(zone_id)?;
        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let result = swap_ref(&tx, zone_id, ledger_id, expected, new);
            finish(tx, result)
        })
        .await
    }

    async fn get_object(&self, zone_id: ZoneId, oid: Oid) -> Result<Option<Object>> {
        validate_zone(zone_id)?;
        validate_object_key(oid)?;
        self.run(move |conn| {
            let content: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT kv_value FROM key_values WHERE zone_id = ?1 AND kv_key = ?2",
                    params![zone_id.0, oid.to_hex()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(content.map(|content| Object::from_parts(oid, content)))
        })
        .await
    }

    async fn put_object(&self, zone_id: ZoneId, object: &Object) -> Result<()> {
        validate_zone(zone_id)?;
        validate_object_key(object.oid())?;
        let key = object.oid().to_hex();
        let content = object.content().to_vec();
        self.run(move |conn| {
            conn.execute(UPSERT_OBJECT, params![zone_id.0, key, content])?;
            Ok(())
        })
        .await
    }

    async fn write_objects(
        &self,
        zone_id: ZoneId,
        objects: &[Object],
        transition: Option<RefTransition>,
    ) -> Result<()> {
        validate_zone(zone_id)?;
        for object in objects {
            validate_object_key(object.oid())?;
        }
        let rows: Vec<(String, Vec<u8>)> = objects
            .iter()
            .map(|o| (o.oid().to_hex(), o.content().to_vec()))
            .collect();
        let count = rows.len();

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let result = (|| -> Result<()> {
                {
                    let mut stmt = tx.prepare_cached(UPSERT_OBJECT)?;
                    for (key, content) in &rows {
                        stmt.execute(params![zone_id.0, key, content])?;
                    }
                }
                if let Some(t) = transition {
                    swap_ref(&tx, zone_id, t.ledger_id, t.expected, t.new)?;
                }
                Ok(())
            })();
            finish(tx, result)
        })
        .await?;

        tracing::debug!(zone = %zone_id, objects = count, ref_update = transition.is_some(), "objects written");
        Ok(())
    }
}
