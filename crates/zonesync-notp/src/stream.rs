//! Framing a whole batch of records as one packet.

use crate::error::Result;
use crate::packet::{Packet, ProtocolPacket, RawPacket};
use crate::reader::PacketReader;
use crate::writer::PacketWriter;

/// Frame a protocol record followed by `packets` as one stream group.
pub fn encode_stream(protocol: &ProtocolPacket, packets: &[RawPacket]) -> Result<Packet> {
    let mut packet = Packet::new();
    let mut writer = PacketWriter::new(&mut packet);
    writer.write_protocol(protocol)?;
    for item in packets {
        writer.append_data_packet(item)?;
    }
    Ok(packet)
}

/// Unframe a packet built by [`encode_stream`], keeping each record's type tag.
pub fn decode_stream(packet: &Packet) -> Result<(ProtocolPacket, Vec<RawPacket>)> {
    let reader = PacketReader::new(packet);
    let protocol = reader.read_protocol()?;
    let packets = reader
        .data_packets()
        .map(|item| item.map(|(packet_type, payload)| RawPacket::new(packet_type, payload)))
        .collect::<Result<Vec<_>>>()?;
    Ok((protocol, packets))
}
