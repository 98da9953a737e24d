//! Stateful writer enforcing protocol-first, single-stream ordering.

use crate::codec::{
    encode_byte_array, index_data_stream_packet, write_data_packet, write_stream_data_packet,
    FIELD_SIZE,
};
use crate::error::{NotpError, Result};
use crate::packet::{Packet, Packetable};

/// Writes one protocol record followed by one growing stream group.
///
/// The writer borrows the packet mutably for its whole lifetime, so no other
/// writer can touch the buffer while a stream count is being rewritten.
#[derive(Debug)]
pub struct PacketWriter<'a> {
    packet: &'a mut Packet,
    protocol_end: Option<usize>,
    stream_open: bool,
}

impl<'a> PacketWriter<'a> {
    pub fn new(packet: &'a mut Packet) -> Self {
        Self {
            packet,
            protocol_end: None,
            stream_open: false,
        }
    }

    /// Write the protocol record. Must be the first and only one.
    pub fn write_protocol(&mut self, protocol: &dyn Packetable) -> Result<()> {
        if self.protocol_end.is_some() || !self.packet.data.is_empty() {
            return Err(NotpError::ProtocolAlreadyWritten);
        }
        let payload = protocol.serialize()?;
        write_data_packet(&mut self.packet.data, protocol.packet_type(), &payload)?;
        self.protocol_end = Some(self.packet.data.len());
        Ok(())
    }

    /// Append one record to the stream group.
    ///
    /// The first append opens the group with a count of 1; later appends
    /// write a plain data packet and bump the count in the group header.
    pub fn append_data_packet(&mut self, item: &dyn Packetable) -> Result<()> {
        let protocol_end = self.protocol_end.ok_or(NotpError::MissingProtocol)?;
        let payload = encode_byte_array(&item.serialize()?);

        if !self.stream_open {
            write_stream_data_packet(&mut self.packet.data, item.packet_type(), Some(1), &payload)?;
            self.stream_open = true;
            return Ok(());
        }

        write_data_packet(&mut self.packet.data, item.packet_type(), &payload)?;

        let header = index_data_stream_packet(protocol_end, &self.packet.data)?;
        let count = header
            .stream_count
            .ok_or(NotpError::InvalidHeader)?
            .checked_add(1)
            .ok_or_else(|| NotpError::Serialization("stream count overflow".into()))?;
        self.packet.data[protocol_end..protocol_end + FIELD_SIZE]
            .copy_from_slice(&count.to_be_bytes());
        Ok(())
    }

    /// Offset one past the protocol record, if it has been written.
    pub fn protocol_end(&self) -> Option<usize> {
        self.protocol_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{ProtocolPacket, RawPacket};

    fn record(text: &str) -> RawPacket {
        RawPacket::new(0, text.as_bytes().to_vec())
    }

    #[test]
    fn test_protocol_twice_fails() {
        let mut packet = Packet::new();
        let mut writer = PacketWriter::new(&mut packet);
        writer.write_protocol(&ProtocolPacket::new(1)).unwrap();
        assert_eq!(
            writer.write_protocol(&ProtocolPacket::new(1)),
            Err(NotpError::ProtocolAlreadyWritten)
        );
    }

    #[test]
    fn test_protocol_on_non_empty_buffer_fails() {
        let mut packet = Packet::from_bytes(vec![1, 2, 3]);
        let mut writer = PacketWriter::new(&mut packet);
        assert_eq!(
            writer.write_protocol(&ProtocolPacket::new(1)),
            Err(NotpError::ProtocolAlreadyWritten)
        );
    }

    #[test]
    fn test_append_before_protocol_fails() {
        let mut packet = Packet::new();
        let mut writer = PacketWriter::new(&mut packet);
        assert_eq!(
            writer.append_data_packet(&record("A")),
            Err(NotpError::MissingProtocol)
        );
        assert!(packet.is_empty());
    }

    #[test]
    fn test_count_rewritten_in_place() {
        let mut packet = Packet::new();
        let mut writer = PacketWriter::new(&mut packet);
        writer.write_protocol(&ProtocolPacket::new(1)).unwrap();
        let end = writer.protocol_end().unwrap();

        writer.append_data_packet(&record("A")).unwrap();
        let len_after_first = packet_len(&writer);
        writer.append_data_packet(&record("B")).unwrap();
        writer.append_data_packet(&record("C")).unwrap();

        let header = index_data_stream_packet(end, &writer.packet.data).unwrap();
        assert_eq!(header.stream_count, Some(3));
        // Later records are plain data packets: no count field.
        let plain = 2 * FIELD_SIZE + 1 + encode_byte_array(b"B").len();
        assert_eq!(packet_len(&writer), len_after_first + 2 * plain);
    }

    fn packet_len(writer: &PacketWriter<'_>) -> usize {
        writer.packet.data.len()
    }
}
