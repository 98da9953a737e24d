//! Primitive field serializers used inside packet payloads.
//!
//! Each field is terminated by [`PACKET_NULL_BYTE`]. Strings and byte
//! arrays are base64 encoded so their content never contains the
//! terminator; integers are fixed-width big-endian and are read by position
//! rather than by scanning, since their bytes may include `0xFF`.
//!
//! Serializers append to a buffer. Deserializers return the value and the
//! unread remainder.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::BufMut;

use crate::codec::PACKET_NULL_BYTE;
use crate::error::{NotpError, Result};

/// Append a base64-encoded string field.
pub fn serialize_string(buf: &mut Vec<u8>, value: &str) {
    serialize_bytes(buf, value.as_bytes());
}

/// Read a string field.
pub fn deserialize_string(data: &[u8]) -> Result<(String, &[u8])> {
    let (bytes, rest) = deserialize_bytes(data)?;
    let value = String::from_utf8(bytes)
        .map_err(|e| NotpError::Deserialization(format!("invalid utf-8 string: {e}")))?;
    Ok((value, rest))
}

/// Append a base64-encoded byte field.
pub fn serialize_bytes(buf: &mut Vec<u8>, value: &[u8]) {
    buf.put_slice(STANDARD.encode(value).as_bytes());
    buf.put_u8(PACKET_NULL_BYTE);
}

/// Read a byte field.
pub fn deserialize_bytes(data: &[u8]) -> Result<(Vec<u8>, &[u8])> {
    let end = data
        .iter()
        .position(|b| *b == PACKET_NULL_BYTE)
        .ok_or(NotpError::DelimiterNotFound)?;
    let value = STANDARD
        .decode(&data[..end])
        .map_err(|e| NotpError::Deserialization(format!("invalid base64 field: {e}")))?;
    Ok((value, &data[end + 1..]))
}

/// Append a one-byte boolean field.
pub fn serialize_bool(buf: &mut Vec<u8>, value: bool) {
    buf.put_u8(u8::from(value));
    buf.put_u8(PACKET_NULL_BYTE);
}

/// Read a boolean field.
pub fn deserialize_bool(data: &[u8]) -> Result<(bool, &[u8])> {
    let (field, rest) = fixed_field::<1>(data, "bool")?;
    Ok((field[0] != 0, rest))
}

/// Append a big-endian `u16` field.
pub fn serialize_u16(buf: &mut Vec<u8>, value: u16) {
    buf.put_u16(value);
    buf.put_u8(PACKET_NULL_BYTE);
}

/// Read a `u16` field.
pub fn deserialize_u16(data: &[u8]) -> Result<(u16, &[u8])> {
    let (field, rest) = fixed_field::<2>(data, "u16")?;
    Ok((u16::from_be_bytes(field), rest))
}

/// Append a big-endian `u32` field.
pub fn serialize_u32(buf: &mut Vec<u8>, value: u32) {
    buf.put_u32(value);
    buf.put_u8(PACKET_NULL_BYTE);
}

/// Read a `u32` field.
pub fn deserialize_u32(data: &[u8]) -> Result<(u32, &[u8])> {
    let (field, rest) = fixed_field::<4>(data, "u32")?;
    Ok((u32::from_be_bytes(field), rest))
}

/// Append a big-endian `u64` field.
pub fn serialize_u64(buf: &mut Vec<u8>, value: u64) {
    buf.put_u64(value);
    buf.put_u8(PACKET_NULL_BYTE);
}

/// Read a `u64` field.
pub fn deserialize_u64(data: &[u8]) -> Result<(u64, &[u8])> {
    let (field, rest) = fixed_field::<8>(data, "u64")?;
    Ok((u64::from_be_bytes(field), rest))
}

fn fixed_field<'a, const N: usize>(
    data: &'a [u8],
    name: &'static str,
) -> Result<([u8; N], &'a [u8])> {
    if data.len() < N + 1 || data[N] != PACKET_NULL_BYTE {
        return Err(NotpError::MissingField(name));
    }
    let mut field = [0u8; N];
    field.copy_from_slice(&data[..N]);
    Ok((field, &data[N + 1..]))
}
