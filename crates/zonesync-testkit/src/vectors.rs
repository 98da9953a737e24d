//! Golden vectors for the wire framing and object addressing.
//!
//! Any implementation of the protocol must reproduce these bytes exactly.

use serde::Serialize;
use zonesync_core::{frame_object, Commit, ObjectType, Oid};
use zonesync_notp::serializers::{deserialize_string, serialize_string};
use zonesync_notp::{Packet, PacketWriter, Packetable, ProtocolPacket};

/// A payload record holding one string, tagged with type 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRecord(pub String);

impl Packetable for TextRecord {
    fn packet_type(&self) -> u64 {
        0
    }

    fn serialize(&self) -> zonesync_notp::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(self.0.len() * 4 / 3 + 5);
        serialize_string(&mut data, &self.0);
        Ok(data)
    }

    fn deserialize(data: &[u8]) -> zonesync_notp::Result<Self> {
        let (text, _) = deserialize_string(data)?;
        Ok(Self(text))
    }
}

/// A packet built from a protocol version and text records.
#[derive(Debug, Clone, Serialize)]
pub struct WireVector {
    pub name: &'static str,
    pub protocol_version: u32,
    pub records: Vec<&'static str>,
    /// Expected packet bytes (hex).
    pub expected_hex: &'static str,
}

/// Get all wire vectors.
pub fn wire_vectors() -> Vec<WireVector> {
    vec![
        WireVector {
            name: "protocol 10 with records A B C",
            protocol_version: 10,
            records: vec!["A", "B", "C"],
            expected_hex: concat!(
                "00000001000000000000000000000005ff0000000aff",
                "000000000000000300000000000000000000000000000008ff555645395066383d",
                "00000000000000000000000000000008ff555763395066383d",
                "00000000000000000000000000000008ff555863395066383d",
            ),
        },
        WireVector {
            name: "protocol only",
            protocol_version: 1,
            records: vec![],
            expected_hex: "00000001000000000000000000000005ff00000001ff",
        },
    ]
}

/// Build the packet a wire vector describes.
pub fn encode_vector(vector: &WireVector) -> zonesync_notp::Result<Packet> {
    let mut packet = Packet::new();
    let mut writer = PacketWriter::new(&mut packet);
    writer.write_protocol(&ProtocolPacket::new(vector.protocol_version))?;
    for record in &vector.records {
        writer.append_data_packet(&TextRecord((*record).to_string()))?;
    }
    Ok(packet)
}

/// An object and the OID it must hash to.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectVector {
    pub name: &'static str,
    /// Framed object bytes (hex).
    pub framed_hex: String,
    pub expected_oid: &'static str,
}

/// Get all object vectors.
pub fn object_vectors() -> Vec<ObjectVector> {
    let blob = frame_object(ObjectType::Blob, b"hello");
    let commit = Commit::new(
        Oid::hash(b"tree"),
        Oid::ZERO,
        "alice",
        1_700_000_000,
        "alice",
        1_700_000_000,
        "init",
    );
    let commit = frame_object(ObjectType::Commit, &commit.serialize());
    vec![
        ObjectVector {
            name: "blob hello",
            framed_hex: hex::encode(blob.content()),
            expected_oid: "0b58b2280120a342a63d5c2399c0d7b8069d84f5198de5d27bfe87537979cf2a",
        },
        ObjectVector {
            name: "root commit",
            framed_hex: hex::encode(commit.content()),
            expected_oid: "a6d006c81900c30fcc722b6806c0c2ccf9c756e7ce92df09caefa20867fb3676",
        },
    ]
}

/// Check every vector, reporting `(name, matches, actual)`.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    let mut results = Vec::new();
    for vector in wire_vectors() {
        let actual = encode_vector(&vector)
            .map(|packet| hex::encode(packet.as_bytes()))
            .unwrap_or_else(|e| format!("error: {e}"));
        results.push((vector.name.to_string(), actual == vector.expected_hex, actual));
    }
    for vector in object_vectors() {
        let actual = match hex::decode(&vector.framed_hex) {
            Ok(bytes) => Oid::hash(&bytes).to_hex(),
            Err(e) => format!("error: {e}"),
        };
        results.push((vector.name.to_string(), actual == vector.expected_oid, actual));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_match() {
        for (name, matches, actual) in verify_all_vectors() {
            assert!(matches, "{name}: got {actual}");
        }
    }

    #[test]
    fn test_vectors_serialize_to_json() {
        let json = serde_json::to_string_pretty(&wire_vectors()).unwrap();
        assert!(json.contains("\"protocol_version\": 10"));
        let json = serde_json::to_value(object_vectors()).unwrap();
        assert_eq!(json[0]["expected_oid"], object_vectors()[0].expected_oid);
    }
}
