//! Payload records exchanged by the sync phases.
//!
//! Every field is delimited by `0xFF`. OIDs travel as base64 of their hex
//! form, object content as base64 of the framed object bytes.

use zonesync_core::{Object, ObjectType, Oid};
use zonesync_notp::serializers::{
    deserialize_bool, deserialize_bytes, deserialize_string, deserialize_u32, serialize_bool,
    serialize_bytes, serialize_string, serialize_u32,
};
use zonesync_notp::{combine_u32_to_u64, NotpError, Packetable};

pub const REMOTE_REF_STATE_PACKET_TYPE: u32 = 20;
pub const LOCAL_REF_STATE_PACKET_TYPE: u32 = 21;
pub const OBJECT_STATE_PACKET_TYPE: u32 = 22;

fn deserialize_oid<'a>(data: &'a [u8], field: &'static str) -> zonesync_notp::Result<(Oid, &'a [u8])> {
    let (hex, rest) = deserialize_string(data).map_err(|_| NotpError::MissingField(field))?;
    if hex.is_empty() {
        return Err(NotpError::MissingField(field));
    }
    let oid = Oid::from_hex(&hex)
        .map_err(|e| NotpError::Deserialization(format!("{field}: {e}")))?;
    Ok((oid, rest))
}

/// What the requesting peer believes about the ledger: the head it last saw
/// (`ref_prev_commit`) and the head it wants to reach (`ref_commit`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteRefStatePacket {
    pub ref_prev_commit: Oid,
    pub ref_commit: Oid,
}

impl Packetable for RemoteRefStatePacket {
    fn packet_type(&self) -> u64 {
        combine_u32_to_u64(REMOTE_REF_STATE_PACKET_TYPE, 0)
    }

    fn serialize(&self) -> zonesync_notp::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(180);
        serialize_string(&mut data, &self.ref_prev_commit.to_hex());
        serialize_string(&mut data, &self.ref_commit.to_hex());
        Ok(data)
    }

    fn deserialize(data: &[u8]) -> zonesync_notp::Result<Self> {
        let (ref_prev_commit, rest) = deserialize_oid(data, "ref prev commit")?;
        let (ref_commit, _) = deserialize_oid(rest, "ref commit")?;
        Ok(Self {
            ref_prev_commit,
            ref_commit,
        })
    }
}

/// The serving side's answer to a [`RemoteRefStatePacket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalRefStatePacket {
    pub ref_commit: Oid,
    pub has_conflicts: bool,
    pub is_up_to_date: bool,
    /// Commits the peer will receive if it proceeds.
    pub number_of_commits: u32,
}

impl Packetable for LocalRefStatePacket {
    fn packet_type(&self) -> u64 {
        combine_u32_to_u64(LOCAL_REF_STATE_PACKET_TYPE, 0)
    }

    fn serialize(&self) -> zonesync_notp::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(100);
        serialize_string(&mut data, &self.ref_commit.to_hex());
        serialize_bool(&mut data, self.has_conflicts);
        serialize_bool(&mut data, self.is_up_to_date);
        serialize_u32(&mut data, self.number_of_commits);
        Ok(data)
    }

    fn deserialize(data: &[u8]) -> zonesync_notp::Result<Self> {
        let (ref_commit, rest) = deserialize_oid(data, "ref commit")?;
        let (has_conflicts, rest) = deserialize_bool(rest)?;
        let (is_up_to_date, rest) = deserialize_bool(rest)?;
        let (number_of_commits, _) = deserialize_u32(rest)?;
        Ok(Self {
            ref_commit,
            has_conflicts,
            is_up_to_date,
            number_of_commits,
        })
    }
}

/// One object in transit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStatePacket {
    pub oid: Oid,
    pub otype: ObjectType,
    /// The framed object bytes.
    pub content: Vec<u8>,
}

impl ObjectStatePacket {
    /// Capture a stored object, tagged with its declared type.
    pub fn new(oid: Oid, otype: ObjectType, content: Vec<u8>) -> Self {
        Self { oid, otype, content }
    }

    pub fn from_object(object: &Object, otype: ObjectType) -> Self {
        Self::new(object.oid(), otype, object.content().to_vec())
    }

    /// True if the content hashes to the announced OID.
    pub fn verify(&self) -> bool {
        Oid::hash(&self.content) == self.oid
    }

    pub fn into_object(self) -> Object {
        Object::from_parts(self.oid, self.content)
    }
}

impl Packetable for ObjectStatePacket {
    fn packet_type(&self) -> u64 {
        combine_u32_to_u64(OBJECT_STATE_PACKET_TYPE, 0)
    }

    fn serialize(&self) -> zonesync_notp::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(100 + self.content.len() * 4 / 3);
        serialize_string(&mut data, &self.oid.to_hex());
        serialize_string(&mut data, self.otype.as_str());
        serialize_bytes(&mut data, &self.content);
        Ok(data)
    }

    fn deserialize(data: &[u8]) -> zonesync_notp::Result<Self> {
        let (oid, rest) = deserialize_oid(data, "oid")?;
        let (otype, rest) = deserialize_string(rest).map_err(|_| NotpError::MissingField("otype"))?;
        let otype = otype
            .parse()
            .map_err(|e| NotpError::Deserialization(format!("otype: {e}")))?;
        let (content, _) = deserialize_bytes(rest).map_err(|_| NotpError::MissingField("content"))?;
        Ok(Self { oid, otype, content })
    }
}
