//! Packet buffer, the `Packetable` capability, and the protocol descriptor.

use crate::error::{NotpError, Result};
use crate::serializers::{deserialize_u32, serialize_u32};

/// Packet type tag of a generic payload.
pub const PACKET_TYPE: u64 = 0;

/// Packet type tag of the protocol descriptor, before widening.
pub const PROTOCOL_PACKET_TYPE: u32 = 1;

/// A single growable byte buffer: the unit of wire transfer.
///
/// Holds one protocol record followed by at most one stream group. The
/// buffer is mutated only through [`PacketWriter`](crate::PacketWriter) and
/// read through [`PacketReader`](crate::PacketReader).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    pub data: Vec<u8>,
}

impl Packet {
    /// Create an empty packet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap bytes received from a transport.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// The framed bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the packet, returning the framed bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A value that can be framed inside a [`Packet`].
///
/// Implementors report a 64-bit type tag and convert to and from bytes. The
/// trait is object safe so a writer can take `&dyn Packetable`.
pub trait Packetable {
    /// The type tag written into the packet header.
    fn packet_type(&self) -> u64;

    /// Serialize the payload.
    fn serialize(&self) -> Result<Vec<u8>>;

    /// Deserialize a payload produced by [`Packetable::serialize`].
    fn deserialize(data: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

/// Combine two 32-bit halves into one 64-bit value (`high << 32 | low`).
pub fn combine_u32_to_u64(high: u32, low: u32) -> u64 {
    (u64::from(high) << 32) | u64::from(low)
}

/// Split a 64-bit value into its `(high, low)` 32-bit halves.
pub fn split_u64_to_u32(value: u64) -> (u32, u32) {
    ((value >> 32) as u32, value as u32)
}

/// True if either half of `value` equals `flag`.
pub fn has_u32(value: u64, flag: u32) -> bool {
    let (high, low) = split_u64_to_u32(value);
    high == flag || low == flag
}

/// Re-encode one packetable as another through its serialized form.
pub fn convert_packetable<T: Packetable>(source: &dyn Packetable) -> Result<T> {
    let data = source.serialize()?;
    T::deserialize(&data)
}

/// The protocol descriptor: the first record of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolPacket {
    pub version: u32,
}

impl ProtocolPacket {
    pub fn new(version: u32) -> Self {
        Self { version }
    }
}

impl Packetable for ProtocolPacket {
    fn packet_type(&self) -> u64 {
        combine_u32_to_u64(PROTOCOL_PACKET_TYPE, 0)
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(5);
        serialize_u32(&mut data, self.version);
        Ok(data)
    }

    fn deserialize(data: &[u8]) -> Result<Self> {
        let (version, _) = deserialize_u32(data).map_err(|_| NotpError::MissingField("version"))?;
        Ok(Self { version })
    }
}

/// A type-tagged payload as it travels between protocol phases.
///
/// Handlers exchange these instead of trait objects so a batch can hold
/// records of different kinds and be re-framed without knowing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub packet_type: u64,
    pub payload: Vec<u8>,
}

impl RawPacket {
    pub fn new(packet_type: u64, payload: Vec<u8>) -> Self {
        Self {
            packet_type,
            payload,
        }
    }

    /// Capture a packetable's tag and serialized bytes.
    pub fn from_packetable(item: &dyn Packetable) -> Result<Self> {
        Ok(Self {
            packet_type: item.packet_type(),
            payload: item.serialize()?,
        })
    }

    /// Decode into a concrete payload, checking the type tag first.
    pub fn decode<T: Packetable>(&self) -> Result<T> {
        let value = T::deserialize(&self.payload)?;
        let expected = value.packet_type();
        if expected != self.packet_type {
            return Err(NotpError::UnexpectedPacketType {
                expected,
                actual: self.packet_type,
            });
        }
        Ok(value)
    }
}

impl Packetable for RawPacket {
    fn packet_type(&self) -> u64 {
        self.packet_type
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        Ok(self.payload.clone())
    }

    /// Deserializing a bare payload loses the tag; it comes back as [`PACKET_TYPE`].
    fn deserialize(data: &[u8]) -> Result<Self> {
        Ok(Self::new(PACKET_TYPE, data.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_and_split() {
        let value = combine_u32_to_u64(7, 9);
        assert_eq!(value, (7u64 << 32) | 9);
        assert_eq!(split_u64_to_u32(value), (7, 9));
        assert!(has_u32(value, 7));
        assert!(has_u32(value, 9));
        assert!(!has_u32(value, 8));
    }

    #[test]
    fn test_protocol_packet_serialization() {
        let protocol = ProtocolPacket::new(10);
        assert_eq!(protocol.packet_type(), 1u64 << 32);

        let bytes = protocol.serialize().unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 10, 0xFF]);
        assert_eq!(ProtocolPacket::deserialize(&bytes).unwrap(), protocol);
    }

    #[test]
    fn test_protocol_packet_short_input() {
        assert_eq!(
            ProtocolPacket::deserialize(&[0, 1]),
            Err(NotpError::MissingField("version"))
        );
    }

    #[test]
    fn test_raw_packet_decode_checks_tag() {
        let raw = RawPacket::from_packetable(&ProtocolPacket::new(3)).unwrap();
        assert_eq!(raw.decode::<ProtocolPacket>().unwrap().version, 3);

        let mistagged = RawPacket::new(42, raw.payload.clone());
        assert_eq!(
            mistagged.decode::<ProtocolPacket>(),
            Err(NotpError::UnexpectedPacketType {
                expected: 1u64 << 32,
                actual: 42
            })
        );
    }

    #[test]
    fn test_convert_packetable() {
        let raw = RawPacket::from_packetable(&ProtocolPacket::new(5)).unwrap();
        let protocol: ProtocolPacket = convert_packetable(&raw).unwrap();
        assert_eq!(protocol.version, 5);
    }
}
