//! Pull-based reader over a packet built by [`PacketWriter`](crate::PacketWriter).

use crate::codec::{decode_byte_array, index_data_packet, read_data_packet, read_stream_data_packet};
use crate::error::{NotpError, Result};
use crate::packet::{Packet, ProtocolPacket, Packetable};

/// Continuation state between calls to [`PacketReader::read_next_data_packet`].
///
/// The state is `Copy`: each read returns a fresh value, so a failed read
/// never disturbs the caller's previous state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPacketState {
    /// Payload offset of the record just read.
    pub offset: usize,
    /// Encoded payload size of the record just read.
    pub size: usize,
    /// Type tag of the record just read.
    pub packet_type: u64,
    /// Number of records in the stream group.
    pub stream_size: u64,
    /// Zero-based index of the record just read.
    pub stream_index: u64,
}

impl DataPacketState {
    /// True once the last record of the group has been read.
    pub fn is_complete(&self) -> bool {
        self.stream_index.checked_add(1) == Some(self.stream_size)
    }
}

/// Reads the protocol record and then the stream group, one record at a time.
#[derive(Debug, Clone, Copy)]
pub struct PacketReader<'a> {
    packet: &'a Packet,
}

impl<'a> PacketReader<'a> {
    pub fn new(packet: &'a Packet) -> Self {
        Self { packet }
    }

    /// Parse the leading protocol record.
    pub fn read_protocol(&self) -> Result<ProtocolPacket> {
        if self.packet.data.is_empty() {
            return Err(NotpError::MissingProtocol);
        }
        let (payload, _) = read_data_packet(0, &self.packet.data)?;
        ProtocolPacket::deserialize(payload)
    }

    /// True if a stream group follows the protocol record.
    pub fn has_data_packets(&self) -> Result<bool> {
        if self.packet.data.is_empty() {
            return Err(NotpError::MissingProtocol);
        }
        let protocol = index_data_packet(0, &self.packet.data)?;
        Ok(protocol.end() < self.packet.data.len())
    }

    /// Read the next record of the stream group.
    ///
    /// Pass `None` to read the first record; pass the returned state back in
    /// to read each following one. The returned payload is base64-decoded
    /// and owned.
    pub fn read_next_data_packet(
        &self,
        state: Option<DataPacketState>,
    ) -> Result<(Vec<u8>, DataPacketState)> {
        let data = &self.packet.data;
        match state {
            None => {
                if data.is_empty() {
                    return Err(NotpError::MissingProtocol);
                }
                let protocol = index_data_packet(0, data)?;
                let (payload, index) = read_stream_data_packet(protocol.end(), data)?;
                let next = DataPacketState {
                    offset: index.payload_offset,
                    size: index.size,
                    packet_type: index.packet_type,
                    stream_size: index.stream_count.unwrap_or_default(),
                    stream_index: 0,
                };
                Ok((decode_byte_array(payload), next))
            }
            Some(state) => {
                if state.is_complete() {
                    return Err(NotpError::StreamComplete);
                }
                let (payload, index) = read_data_packet(state.offset + state.size, data)?;
                let next = DataPacketState {
                    offset: index.payload_offset,
                    size: index.size,
                    packet_type: index.packet_type,
                    stream_size: state.stream_size,
                    stream_index: state.stream_index + 1,
                };
                Ok((decode_byte_array(payload), next))
            }
        }
    }

    /// Iterate over `(packet_type, payload)` for every record in the group.
    ///
    /// A packet holding only a protocol record yields nothing. Iteration
    /// stops after the first error.
    pub fn data_packets(&self) -> DataPackets<'a> {
        DataPackets {
            reader: *self,
            state: None,
            done: false,
        }
    }
}

/// Iterator returned by [`PacketReader::data_packets`].
#[derive(Debug)]
pub struct DataPackets<'a> {
    reader: PacketReader<'a>,
    state: Option<DataPacketState>,
    done: bool,
}

impl Iterator for DataPackets<'_> {
    type Item = Result<(u64, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.state {
            Some(state) if state.is_complete() => {
                self.done = true;
                return None;
            }
            None => match self.reader.has_data_packets() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            },
            Some(_) => {}
        }

        match self.reader.read_next_data_packet(self.state) {
            Ok((payload, state)) => {
                self.state = Some(state);
                Some(Ok((state.packet_type, payload)))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::RawPacket;
    use crate::writer::PacketWriter;

    fn build(records: &[&str]) -> Packet {
        let mut packet = Packet::new();
        let mut writer = PacketWriter::new(&mut packet);
        writer.write_protocol(&ProtocolPacket::new(10)).unwrap();
        for r in records {
            writer
                .append_data_packet(&RawPacket::new(5, r.as_bytes().to_vec()))
                .unwrap();
        }
        packet
    }

    #[test]
    fn test_read_protocol_empty_buffer() {
        let packet = Packet::new();
        let reader = PacketReader::new(&packet);
        assert_eq!(reader.read_protocol(), Err(NotpError::MissingProtocol));
        assert_eq!(
            reader.read_next_data_packet(None),
            Err(NotpError::MissingProtocol)
        );
    }

    #[test]
    fn test_completion_boundary() {
        let packet = build(&["a", "b", "c", "d"]);
        let reader = PacketReader::new(&packet);

        let mut state = None;
        for i in 0..4u64 {
            let (_, next) = reader.read_next_data_packet(state).unwrap();
            assert_eq!(next.stream_index, i);
            assert_eq!(next.is_complete(), i == 3);
            state = Some(next);
        }

        let before = state;
        assert_eq!(
            reader.read_next_data_packet(state),
            Err(NotpError::StreamComplete)
        );
        assert_eq!(state, before);
    }

    #[test]
    fn test_protocol_only_packet() {
        let packet = build(&[]);
        let reader = PacketReader::new(&packet);
        assert_eq!(reader.read_protocol().unwrap().version, 10);
        assert!(!reader.has_data_packets().unwrap());
        assert_eq!(reader.data_packets().count(), 0);
        assert_eq!(
            reader.read_next_data_packet(None),
            Err(NotpError::DelimiterNotFound)
        );
    }

    #[test]
    fn test_iterator_yields_types_and_payloads() {
        let packet = build(&["x", "y"]);
        let reader = PacketReader::new(&packet);
        let records: Vec<_> = reader.data_packets().collect::<Result<_>>().unwrap();
        assert_eq!(records, vec![(5, b"x".to_vec()), (5, b"y".to_vec())]);
    }

    #[test]
    fn test_truncated_stream() {
        let mut packet = build(&["first", "second"]);
        packet.data.truncate(packet.data.len() - 4);
        let reader = PacketReader::new(&packet);

        let (_, state) = reader.read_next_data_packet(None).unwrap();
        assert!(matches!(
            reader.read_next_data_packet(Some(state)),
            Err(NotpError::TruncatedPayload { .. })
        ));

        let results: Vec<_> = reader.data_packets().collect();
        assert_eq!(results.len(), 2);
        assert!(results[1].is_err());
    }
}
