//! # Zonesync NOTP
//!
//! Wire framing for the zonesync replication protocol.
//!
//! ## Overview
//!
//! A [`Packet`] is one growable buffer holding a protocol record followed by
//! a single stream group of records. [`PacketWriter`] enforces the ordering
//! (protocol first, then appends) and keeps the group's element count current
//! by rewriting it in place. [`PacketReader`] walks the group back out with an
//! explicit [`DataPacketState`] cursor.
//!
//! ## Usage
//!
//! ```rust
//! use zonesync_notp::{Packet, PacketReader, PacketWriter, ProtocolPacket, RawPacket};
//!
//! let mut packet = Packet::new();
//! let mut writer = PacketWriter::new(&mut packet);
//! writer.write_protocol(&ProtocolPacket::new(1)).unwrap();
//! writer.append_data_packet(&RawPacket::new(0, b"hello".to_vec())).unwrap();
//!
//! let reader = PacketReader::new(&packet);
//! assert_eq!(reader.read_protocol().unwrap().version, 1);
//! let (payload, state) = reader.read_next_data_packet(None).unwrap();
//! assert_eq!(payload, b"hello");
//! assert!(state.is_complete());
//! ```
//!
//! ## Wire Format
//!
//! ```text
//! [type:8][size:8] FF [protocol]
//! [count:8][type:8][size:8] FF [base64(record 0)]
//! [type:8][size:8] FF [base64(record 1)]
//! ...
//! ```
//!
//! All header fields are big-endian `u64`.

pub mod codec;
pub mod error;
pub mod packet;
pub mod reader;
pub mod serializers;
pub mod state;
pub mod stream;
pub mod writer;

pub use codec::{decode_byte_array, encode_byte_array, PacketIndex, PACKET_NULL_BYTE};
pub use error::{NotpError, Result};
pub use packet::{
    combine_u32_to_u64, convert_packetable, has_u32, split_u64_to_u32, Packet, Packetable,
    ProtocolPacket, RawPacket, PACKET_TYPE, PROTOCOL_PACKET_TYPE,
};
pub use reader::{DataPacketState, DataPackets, PacketReader};
pub use state::{code, message_value, value, StatePacket, STATE_PACKET_TYPE};
pub use stream::{decode_stream, encode_stream};
pub use writer::PacketWriter;
