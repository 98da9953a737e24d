//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use zonesync_core::{LedgerId, Object, Oid, ZoneId};

use crate::error::{Result, StoreError};
use crate::now_millis;
use crate::traits::{
    validate_name, validate_object_key, validate_zone, Ledger, RefTransition, Store,
};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    ledgers: HashMap<(ZoneId, LedgerId), Ledger>,
    objects: HashMap<(ZoneId, Oid), Vec<u8>>,
}

impl MemoryStoreInner {
    /// Check the CAS precondition without writing.
    fn check_ref(&self, zone_id: ZoneId, ledger_id: LedgerId, expected: Oid) -> Result<()> {
        let ledger = self
            .ledgers
            .get(&(zone_id, ledger_id))
            .ok_or_else(|| StoreError::LedgerNotFound(ledger_id.to_string()))?;
        if ledger.head != expected {
            return Err(StoreError::RefMismatch {
                expected,
                actual: ledger.head,
            });
        }
        Ok(())
    }

    fn set_ref(&mut self, zone_id: ZoneId, ledger_id: LedgerId, new: Oid) {
        if let Some(ledger) = self.ledgers.get_mut(&(zone_id, ledger_id)) {
            ledger.head = new;
            ledger.updated_at = now_millis();
        }
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::InvalidData(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::InvalidData(format!("lock poisoned: {e}")))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_ledger(&self, zone_id: ZoneId, name: &str) -> Result<Ledger> {
        validate_zone(zone_id)?;
        validate_name(name)?;
        let mut inner = self.write()?;

        if inner
            .ledgers
            .values()
            .any(|l| l.zone_id == zone_id && l.name == name)
        {
            return Err(StoreError::LedgerExists(name.to_string()));
        }

        let now = now_millis();
        let ledger = Ledger {
            zone_id,
            ledger_id: LedgerId::new_v4(),
            name: name.to_string(),
            head: Oid::ZERO,
            created_at: now,
            updated_at: now,
        };
        inner
            .ledgers
            .insert((zone_id, ledger.ledger_id), ledger.clone());
        Ok(ledger)
    }

    async fn get_ledger(&self, zone_id: ZoneId, ledger_id: LedgerId) -> Result<Option<Ledger>> {
        validate_zone(zone_id)?;
        Ok(self.read()?.ledgers.get(&(zone_id, ledger_id)).cloned())
    }

    async fn get_ledger_by_name(&self, zone_id: ZoneId, name: &str) -> Result<Option<Ledger>> {
        validate_zone(zone_id)?;
        Ok(self
            .read()?
            .ledgers
            .values()
            .find(|l| l.zone_id == zone_id && l.name == name)
            .cloned())
    }

    async fn list_ledgers(&self, zone_id: ZoneId) -> Result<Vec<Ledger>> {
        validate_zone(zone_id)?;
        let mut ledgers: Vec<Ledger> = self
            .read()?
            .ledgers
            .values()
            .filter(|l| l.zone_id == zone_id)
            .cloned()
            .collect();
        ledgers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(ledgers)
    }

    async fn compare_and_swap_ref(
        &self,
        zone_id: ZoneId,
        ledger_id: LedgerId,
        expected: Oid,
        new: Oid,
    ) -> Result<()> {
        validate_zone(zone_id)?;
        let mut inner = self.write()?;
        inner.check_ref(zone_id, ledger_id, expected)?;
        inner.set_ref(zone_id, ledger_id, new);
        Ok(())
    }

    async fn get_object(&self, zone_id: ZoneId, oid: Oid) -> Result<Option<Object>> {
        validate_zone(zone_id)?;
        validate_object_key(oid)?;
        Ok(self
            .read()?
            .objects
            .get(&(zone_id, oid))
            .map(|content| Object::from_parts(oid, content.clone())))
    }

    async fn put_object(&self, zone_id: ZoneId, object: &Object) -> Result<()> {
        validate_zone(zone_id)?;
        validate_object_key(object.oid())?;
        self.write()?
            .objects
            .insert((zone_id, object.oid()), object.content().to_vec());
        Ok(())
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

        let mut inner = self.write()?;
        if let Some(t) = transition {
            inner.check_ref(zone_id, t.ledger_id, t.expected)?;
        }
        for object in objects {
            inner
                .objects
                .insert((zone_id, object.oid()), object.content().to_vec());
        }
        if let Some(t) = transition {
            inner.set_ref(zone_id, t.ledger_id, t.new);
        }
        Ok(())
    }
}
