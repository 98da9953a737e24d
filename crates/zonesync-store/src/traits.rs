//! Store trait: the abstract interface for object and ledger persistence.
//!
//! This trait keeps the sync handlers storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use zonesync_core::{LedgerId, Object, Oid, ZoneId};

use crate::error::{Result, StoreError};

/// A zone-scoped ledger and its head commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    pub zone_id: ZoneId,
    pub ledger_id: LedgerId,
    pub name: String,
    /// Current head commit, [`Oid::ZERO`] for an empty history.
    pub head: Oid,
    /// Creation time (Unix ms).
    pub created_at: i64,
    /// Last ref change (Unix ms).
    pub updated_at: i64,
}

/// A compare-and-swap of a ledger head, applied with a batch of objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefTransition {
    pub ledger_id: LedgerId,
    pub expected: Oid,
    pub new: Oid,
}

/// The Store trait: async interface for object and ledger persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Upserts**: Objects are content-addressed, so writing an existing OID
///   replaces identical bytes and is harmless.
/// - **Compare-and-swap**: A ledger head only moves when the caller presents
///   the current value; otherwise [`StoreError::RefMismatch`] is returned and
///   nothing is written.
/// - **Atomic batches**: [`Store::write_objects`] applies all upserts and the
///   optional ref transition in one transaction.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Ledger Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a ledger with an empty history.
    async fn create_ledger(&self, zone_id: ZoneId, name: &str) -> Result<Ledger>;

    /// Get a ledger by id.
    async fn get_ledger(&self, zone_id: ZoneId, ledger_id: LedgerId) -> Result<Option<Ledger>>;

    /// Get a ledger by name.
    async fn get_ledger_by_name(&self, zone_id: ZoneId, name: &str) -> Result<Option<Ledger>>;

    /// List the ledgers of a zone, ordered by name.
    async fn list_ledgers(&self, zone_id: ZoneId) -> Result<Vec<Ledger>>;

    /// Move a ledger head from `expected` to `new`.
    ///
    /// # Returns
    /// - `RefMismatch` if the head is not `expected`.
    /// - `LedgerNotFound` if the ledger does not exist.
    async fn compare_and_swap_ref(
        &self,
        zone_id: ZoneId,
        ledger_id: LedgerId,
        expected: Oid,
        new: Oid,
    ) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Object Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Look up an object by OID.
    async fn get_object(&self, zone_id: ZoneId, oid: Oid) -> Result<Option<Object>>;

    /// Check if an object exists.
    async fn has_object(&self, zone_id: ZoneId, oid: Oid) -> Result<bool> {
        Ok(self.get_object(zone_id, oid).await?.is_some())
    }

    /// Insert or replace an object.
    async fn put_object(&self, zone_id: ZoneId, object: &Object) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Batch Operations (for sync protocol)
    // ─────────────────────────────────────────────────────────────────────────

    /// Upsert `objects` and apply `transition`, all or nothing.
    async fn write_objects(
        &self,
        zone_id: ZoneId,
        objects: &[Object],
        transition: Option<RefTransition>,
    ) -> Result<()>;
}

/// Reject zone ids that cannot exist.
pub fn validate_zone(zone_id: ZoneId) -> Result<()> {
    if !zone_id.is_valid() {
        return Err(StoreError::InvalidInput(format!("invalid zone id {zone_id}")));
    }
    Ok(())
}

/// Reject empty names or names containing whitespace.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(StoreError::InvalidInput(format!("invalid ledger name {name:?}")));
    }
    Ok(())
}

/// Reject the zero OID as an object key.
pub fn validate_object_key(oid: Oid) -> Result<()> {
    if oid.is_zero() {
        return Err(StoreError::InvalidInput("object key is empty".into()));
    }
    Ok(())
}
