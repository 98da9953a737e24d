//! Low-level framing of NOTP sub-packets inside one linear buffer.
//!
//! Every header field is a big-endian `u64`, and the header is closed by
//! [`PACKET_NULL_BYTE`]:
//!
//! ```text
//! data packet:          [type:8][size:8] 0xFF [payload:size]
//! stream-data packet:   [count:8][type:8][size:8] 0xFF [payload:size]
//! ```
//!
//! This module knows nothing about protocol phases. The stateful
//! [`PacketWriter`](crate::PacketWriter) and [`PacketReader`](crate::PacketReader)
//! sit on top of it and enforce ordering.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::BufMut;

use crate::error::{NotpError, Result};

/// Delimiter between a header and its payload, and between serialized fields.
pub const PACKET_NULL_BYTE: u8 = 0xFF;

/// Width of one header field.
pub const FIELD_SIZE: usize = std::mem::size_of::<u64>();

/// Encode bytes as standard base64.
///
/// Stream payloads go through this before framing so they never contain the
/// delimiter byte.
pub fn encode_byte_array(data: &[u8]) -> Vec<u8> {
    STANDARD.encode(data).into_bytes()
}

/// Decode standard base64, returning the input unchanged when it is not
/// valid base64.
pub fn decode_byte_array(data: &[u8]) -> Vec<u8> {
    match STANDARD.decode(data) {
        Ok(decoded) => decoded,
        Err(_) => data.to_vec(),
    }
}

/// Location of one sub-packet inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketIndex {
    /// Offset of the first payload byte.
    pub payload_offset: usize,
    /// Payload length in bytes.
    pub size: usize,
    /// The packet type tag.
    pub packet_type: u64,
    /// Element count, present only on stream-data packets.
    pub stream_count: Option<u64>,
}

impl PacketIndex {
    /// Offset one past the last payload byte.
    pub fn end(&self) -> usize {
        self.payload_offset + self.size
    }
}

/// Append a stream-data packet, or a plain data packet when `stream_count` is `None`.
pub fn write_stream_data_packet(
    data: &mut Vec<u8>,
    packet_type: u64,
    stream_count: Option<u64>,
    payload: &[u8],
) -> Result<()> {
    let size = u64::try_from(payload.len())
        .map_err(|_| NotpError::Serialization("payload too large".into()))?;
    data.reserve(3 * FIELD_SIZE + 1 + payload.len());
    if let Some(count) = stream_count {
        data.put_u64(count);
    }
    data.put_u64(packet_type);
    data.put_u64(size);
    data.put_u8(PACKET_NULL_BYTE);
    data.put_slice(payload);
    Ok(())
}

/// Append a plain data packet.
pub fn write_data_packet(data: &mut Vec<u8>, packet_type: u64, payload: &[u8]) -> Result<()> {
    write_stream_data_packet(data, packet_type, None, payload)
}

/// Locate a header of `N` fields starting at `offset`.
///
/// The delimiter is expected right after the fixed-width fields. A field can
/// legitimately contain a `0xFF` byte (a size of 65280, say), so the first
/// `0xFF` found by scanning is only used to classify the failure.
fn index_header<const N: usize>(offset: usize, data: &[u8]) -> Result<(usize, [u64; N])> {
    let region = data.get(offset..).ok_or(NotpError::DelimiterNotFound)?;
    let header_len = N * FIELD_SIZE;
    if region.get(header_len) != Some(&PACKET_NULL_BYTE) {
        return match region.iter().position(|b| *b == PACKET_NULL_BYTE) {
            Some(_) => Err(NotpError::InvalidHeader),
            None => Err(NotpError::DelimiterNotFound),
        };
    }

    let mut values = [0u64; N];
    for (value, chunk) in values
        .iter_mut()
        .zip(region[..header_len].chunks_exact(FIELD_SIZE))
    {
        let mut field = [0u8; FIELD_SIZE];
        field.copy_from_slice(chunk);
        *value = u64::from_be_bytes(field);
    }
    Ok((offset + header_len + 1, values))
}

fn to_size(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| NotpError::InvalidHeader)
}

/// Index a plain data packet at `offset`.
pub fn index_data_packet(offset: usize, data: &[u8]) -> Result<PacketIndex> {
    let (payload_offset, [packet_type, size]) = index_header::<2>(offset, data)?;
    Ok(PacketIndex {
        payload_offset,
        size: to_size(size)?,
        packet_type,
        stream_count: None,
    })
}

/// Index a stream-data packet at `offset`.
pub fn index_data_stream_packet(offset: usize, data: &[u8]) -> Result<PacketIndex> {
    let (payload_offset, [stream_count, packet_type, size]) = index_header::<3>(offset, data)?;
    Ok(PacketIndex {
        payload_offset,
        size: to_size(size)?,
        packet_type,
        stream_count: Some(stream_count),
    })
}

fn payload_slice<'a>(index: &PacketIndex, data: &'a [u8]) -> Result<&'a [u8]> {
    data.get(index.payload_offset..)
        .and_then(|rest| rest.get(..index.size))
        .ok_or(NotpError::TruncatedPayload {
            expected: index.size,
            available: data.len().saturating_sub(index.payload_offset),
        })
}

/// Read a plain data packet at `offset`.
///
/// The returned payload borrows from `data`.
pub fn read_data_packet(offset: usize, data: &[u8]) -> Result<(&[u8], PacketIndex)> {
    let index = index_data_packet(offset, data)?;
    Ok((payload_slice(&index, data)?, index))
}

/// Read a stream-data packet at `offset`.
///
/// The returned payload borrows from `data`.
pub fn read_stream_data_packet(offset: usize, data: &[u8]) -> Result<(&[u8], PacketIndex)> {
    let index = index_data_stream_packet(offset, data)?;
    Ok((payload_slice(&index, data)?, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_packet_layout() {
        let mut buf = Vec::new();
        write_data_packet(&mut buf, 7, b"abc").unwrap();

        assert_eq!(buf.len(), 2 * FIELD_SIZE + 1 + 3);
        assert_eq!(&buf[..8], &7u64.to_be_bytes());
        assert_eq!(&buf[8..16], &3u64.to_be_bytes());
        assert_eq!(buf[16], PACKET_NULL_BYTE);
        assert_eq!(&buf[17..], b"abc");
    }

    #[test]
    fn test_stream_data_packet_layout() {
        let mut buf = Vec::new();
        write_stream_data_packet(&mut buf, 9, Some(4), b"xy").unwrap();

        assert_eq!(&buf[..8], &4u64.to_be_bytes());
        assert_eq!(&buf[8..16], &9u64.to_be_bytes());
        assert_eq!(&buf[16..24], &2u64.to_be_bytes());
        assert_eq!(buf[24], PACKET_NULL_BYTE);

        let (payload, index) = read_stream_data_packet(0, &buf).unwrap();
        assert_eq!(payload, b"xy");
        assert_eq!(index.stream_count, Some(4));
        assert_eq!(index.packet_type, 9);
    }

    #[test]
    fn test_read_at_offset() {
        let mut buf = Vec::new();
        write_data_packet(&mut buf, 1, b"first").unwrap();
        let end = buf.len();
        write_data_packet(&mut buf, 2, b"second").unwrap();

        let (payload, index) = read_data_packet(end, &buf).unwrap();
        assert_eq!(payload, b"second");
        assert_eq!(index.packet_type, 2);
        assert_eq!(index.end(), buf.len());
    }

    #[test]
    fn test_missing_delimiter() {
        let buf = vec![0u8; 12];
        assert_eq!(index_data_packet(0, &buf), Err(NotpError::DelimiterNotFound));
        assert_eq!(index_data_packet(40, &buf), Err(NotpError::DelimiterNotFound));
    }

    #[test]
    fn test_wrong_header_width() {
        // Three fields where two are expected.
        let mut buf = Vec::new();
        write_stream_data_packet(&mut buf, 1, Some(1), b"p").unwrap();
        assert_eq!(index_data_packet(0, &buf), Err(NotpError::InvalidHeader));

        // Two fields where three are expected.
        let mut buf = Vec::new();
        write_data_packet(&mut buf, 1, b"p").unwrap();
        assert_eq!(index_data_stream_packet(0, &buf), Err(NotpError::InvalidHeader));
    }

    #[test]
    fn test_truncated_payload() {
        let mut buf = Vec::new();
        write_data_packet(&mut buf, 1, b"payload").unwrap();
        buf.truncate(buf.len() - 3);

        assert_eq!(
            read_data_packet(0, &buf).unwrap_err(),
            NotpError::TruncatedPayload {
                expected: 7,
                available: 4
            }
        );
    }

    #[test]
    fn test_header_field_containing_delimiter_byte() {
        let payload = vec![b'A'; 0xFF00];
        let mut buf = Vec::new();
        write_data_packet(&mut buf, 0xFF, &payload).unwrap();

        let (read, index) = read_data_packet(0, &buf).unwrap();
        assert_eq!(index.packet_type, 0xFF);
        assert_eq!(read.len(), 0xFF00);
    }

    #[test]
    fn test_base64_roundtrip_and_lenient_decode() {
        let raw = [0u8, 0xFF, 0x10, 0x80];
        let encoded = encode_byte_array(&raw);
        assert!(!encoded.contains(&PACKET_NULL_BYTE));
        assert_eq!(decode_byte_array(&encoded), raw);

        // Not base64: handed back untouched.
        let garbage = [0xFFu8, b'!', b'?'];
        assert_eq!(decode_byte_array(&garbage), garbage);
    }
}
