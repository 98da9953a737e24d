//! Session-scoped scratch space shared by the phases of one sync session.
//!
//! A [`HandlerContext`] is created when a session starts and dropped when it
//! ends. Handlers read the zone and ledger from it and leave cursor state in
//! it for later phases.

use std::collections::HashMap;

use zonesync_core::{LedgerId, Oid, ZoneId};

use crate::error::{Result, SyncError};

/// Well-known context keys.
pub mod keys {
    pub const ZONE_ID: &str = "zone-id";
    pub const LEDGER_ID: &str = "ledger-id";
    /// Head of the serving side's ledger when the session started.
    pub const LOCAL_COMMIT_ID: &str = "local-commit-id";
    /// Commit the peer wants the ledger to reach.
    pub const REMOTE_COMMIT_ID: &str = "remote-commit-id";
    pub const TERMINATION: &str = "termination";
    /// Commit OIDs to transfer, oldest first.
    pub const DIFF_COMMIT_IDS: &str = "diff-commit-ids";
    /// Index of the last transferred entry of `DIFF_COMMIT_IDS`, -1 before the first.
    pub const DIFF_COMMIT_ID_CURSOR: &str = "diff-commit-id-cursor";
}

/// A value stored in a [`HandlerContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Oid(Oid),
    Oids(Vec<Oid>),
}

/// Conversion out of a [`ContextValue`].
///
/// Text values are coerced where the target has a textual form, so a zone id
/// set as `"7"` reads back as `ZoneId(7)`.
pub trait FromContextValue: Sized {
    fn from_context_value(value: &ContextValue) -> Option<Self>;
}

impl FromContextValue for bool {
    fn from_context_value(value: &ContextValue) -> Option<Self> {
        match value {
            ContextValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromContextValue for i64 {
    fn from_context_value(value: &ContextValue) -> Option<Self> {
        match value {
            ContextValue::Int(i) => Some(*i),
            ContextValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromContextValue for String {
    fn from_context_value(value: &ContextValue) -> Option<Self> {
        match value {
            ContextValue::Text(s) => Some(s.clone()),
            ContextValue::Int(i) => Some(i.to_string()),
            ContextValue::Oid(oid) => Some(oid.to_hex()),
            _ => None,
        }
    }
}

impl FromContextValue for Oid {
    fn from_context_value(value: &ContextValue) -> Option<Self> {
        match value {
            ContextValue::Oid(oid) => Some(*oid),
            ContextValue::Text(s) => Oid::from_hex(s).ok(),
            _ => None,
        }
    }
}

impl FromContextValue for Vec<Oid> {
    fn from_context_value(value: &ContextValue) -> Option<Self> {
        match value {
            ContextValue::Oids(oids) => Some(oids.clone()),
            _ => None,
        }
    }
}

impl FromContextValue for ZoneId {
    fn from_context_value(value: &ContextValue) -> Option<Self> {
        i64::from_context_value(value).map(ZoneId)
    }
}

impl FromContextValue for LedgerId {
    fn from_context_value(value: &ContextValue) -> Option<Self> {
        match value {
            ContextValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Bool(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Int(value)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Text(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Text(value)
    }
}

impl From<Oid> for ContextValue {
    fn from(value: Oid) -> Self {
        ContextValue::Oid(value)
    }
}

impl From<Vec<Oid>> for ContextValue {
    fn from(value: Vec<Oid>) -> Self {
        ContextValue::Oids(value)
    }
}

impl From<ZoneId> for ContextValue {
    fn from(value: ZoneId) -> Self {
        ContextValue::Int(value.0)
    }
}

impl From<LedgerId> for ContextValue {
    fn from(value: LedgerId) -> Self {
        ContextValue::Text(value.to_simple_string())
    }
}

/// Key/value scratch space for one sync session.
#[derive(Debug, Clone, Default)]
pub struct HandlerContext {
    values: HashMap<String, ContextValue>,
}

impl HandlerContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context seeded with the zone and ledger keys every handler reads.
    pub fn for_ledger(zone_id: ZoneId, ledger_id: LedgerId) -> Self {
        let mut ctx = Self::new();
        ctx.set(keys::ZONE_ID, zone_id);
        ctx.set(keys::LEDGER_ID, ledger_id);
        ctx
    }

    pub fn set(&mut self, key: &str, value: impl Into<ContextValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Typed read. `None` if the key is absent or holds an incompatible value.
    pub fn get<T: FromContextValue>(&self, key: &str) -> Option<T> {
        self.values.get(key).and_then(T::from_context_value)
    }

    /// Typed read that fails when the key is absent or unreadable as `T`.
    pub fn require<T: FromContextValue>(&self, key: &str) -> Result<T> {
        self.get(key)
            .ok_or_else(|| SyncError::InvalidInput(format!("missing or invalid context key {key:?}")))
    }

    pub fn raw(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        self.values.remove(key)
    }

    /// The session's zone and ledger, validated.
    pub fn ledger_keys(&self) -> Result<(ZoneId, LedgerId)> {
        let zone_id: ZoneId = self.require(keys::ZONE_ID)?;
        if !zone_id.is_valid() {
            return Err(SyncError::InvalidInput(format!("invalid zone id {zone_id}")));
        }
        let ledger_id: LedgerId = self.require(keys::LEDGER_ID)?;
        Ok((zone_id, ledger_id))
    }
}
