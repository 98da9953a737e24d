//! Strong type definitions for zonesync.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

/// A 32-byte object identifier, computed as SHA-256 of the framed object.
///
/// On the wire and in storage an OID is 64 lowercase hex characters. The
/// all-zero OID is the sentinel for "no commit".
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Oid(pub [u8; 32]);

impl Oid {
    /// The empty-history sentinel.
    pub const ZERO: Self = Self([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hash arbitrary bytes into an OID.
    pub fn hash(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Full 64-character hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the 64-character hex form.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidOid(format!("{s:?}: {e}")))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidOid(format!("{s:?}: expected 32 bytes")))?;
        Ok(Self(arr))
    }
}

impl Default for Oid {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Oid {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl AsRef<[u8]> for Oid {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Oid {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Numeric identifier of an application zone (tenant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneId(pub i64);

impl ZoneId {
    /// Zone ids are strictly positive.
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a ledger within a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerId(pub Uuid);

impl LedgerId {
    /// Generate a fresh random ledger id.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Dashless lowercase form used in storage.
    pub fn to_simple_string(&self) -> String {
        self.0.simple().to_string()
    }
}

impl fmt::Display for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for LedgerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oid_hex_roundtrip() {
        let oid = Oid::from_bytes([0x42; 32]);
        let recovered: Oid = oid.to_hex().parse().unwrap();
        assert_eq!(oid, recovered);
        assert_eq!(oid.to_string().len(), 64);
    }

    #[test]
    fn test_oid_zero() {
        assert!(Oid::ZERO.is_zero());
        assert_eq!(Oid::ZERO.to_hex(), "0".repeat(64));
        assert_eq!(Oid::default(), Oid::ZERO);
    }

    #[test]
    fn test_oid_rejects_bad_input() {
        assert!(Oid::from_hex("abc").is_err());
        assert!(Oid::from_hex(&"zz".repeat(32)).is_err());
        assert!(Oid::from_hex("").is_err());
    }

    #[test]
    fn test_oid_hash_is_sha256() {
        // SHA-256("abc")
        assert_eq!(
            Oid::hash(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_oid_debug() {
        let debug = format!("{:?}", Oid::from_bytes([0xcd; 32]));
        assert_eq!(debug, "Oid(cdcdcdcdcdcdcdcd)");
    }

    #[test]
    fn test_zone_id_validity() {
        assert!(ZoneId(1).is_valid());
        assert!(!ZoneId(0).is_valid());
        assert!(!ZoneId(-4).is_valid());
    }

    #[test]
    fn test_ledger_id_parse() {
        let id = LedgerId::new_v4();
        let parsed: LedgerId = id.to_simple_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
