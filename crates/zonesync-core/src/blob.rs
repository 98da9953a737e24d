//! Blob objects: an [`ObjectHeader`] describing the code, then raw data.
//!
//! Header layout, all integers big-endian:
//!
//! ```text
//! [partition_len:2][partition][native:1][language_id:4][language_version_id:4]
//! [language_type_id:4][code_type_id:4][code_id_len:2][base64(code_id)] FF [data]
//! ```
//!
//! The fixed-width fields may contain `0xFF`, so the header is read field by
//! field and the separator is checked at its expected position.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{Buf, BufMut};

use crate::error::{CoreError, Result};
use crate::object::OBJECT_NULL_BYTE;

/// Describes the code stored in a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHeader {
    pub partition: String,
    pub is_native_language: bool,
    pub language_id: u32,
    pub language_version_id: u32,
    pub language_type_id: u32,
    pub code_id: String,
    pub code_type_id: u32,
}

impl ObjectHeader {
    pub fn new(
        partition: &str,
        is_native_language: bool,
        language_id: u32,
        language_version_id: u32,
        language_type_id: u32,
        code_id: &str,
        code_type_id: u32,
    ) -> Self {
        Self {
            partition: partition.to_string(),
            is_native_language,
            language_id,
            language_version_id,
            language_type_id,
            code_id: code_id.to_string(),
            code_type_id,
        }
    }
}

fn length_prefix(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| CoreError::InvalidBlob(format!("{what} too long")))
}

/// Serialize a blob body: header, separator, data.
pub fn serialize_blob(header: &ObjectHeader, data: &[u8]) -> Result<Vec<u8>> {
    let code_id = STANDARD.encode(header.code_id.as_bytes());
    let mut buf = Vec::with_capacity(header.partition.len() + code_id.len() + 24 + data.len());

    buf.put_u16(length_prefix(header.partition.len(), "partition")?);
    buf.put_slice(header.partition.as_bytes());
    buf.put_u8(u8::from(header.is_native_language));
    buf.put_u32(header.language_id);
    buf.put_u32(header.language_version_id);
    buf.put_u32(header.language_type_id);
    buf.put_u32(header.code_type_id);
    buf.put_u16(length_prefix(code_id.len(), "code id")?);
    buf.put_slice(code_id.as_bytes());
    buf.put_u8(OBJECT_NULL_BYTE);
    buf.put_slice(data);
    Ok(buf)
}

fn need(buf: &[u8], n: usize, what: &str) -> Result<()> {
    if buf.len() < n {
        return Err(CoreError::InvalidBlob(format!("failed to read {what}")));
    }
    Ok(())
}

fn take_string(buf: &mut &[u8], len: usize, what: &str) -> Result<String> {
    need(*buf, len, what)?;
    let value = String::from_utf8(buf[..len].to_vec())
        .map_err(|_| CoreError::InvalidBlob(format!("{what} is not utf-8")))?;
    buf.advance(len);
    Ok(value)
}

/// Parse a blob body into its header and data.
pub fn deserialize_blob(body: &[u8]) -> Result<(ObjectHeader, Vec<u8>)> {
    let mut buf = body;

    need(buf, 2, "partition length")?;
    let partition_len = usize::from(buf.get_u16());
    let partition = take_string(&mut buf, partition_len, "partition")?;

    need(buf, 1 + 4 * 4 + 2, "header fields")?;
    let is_native_language = buf.get_u8() != 0;
    let language_id = buf.get_u32();
    let language_version_id = buf.get_u32();
    let language_type_id = buf.get_u32();
    let code_type_id = buf.get_u32();
    let code_id_len = usize::from(buf.get_u16());
    let encoded = take_string(&mut buf, code_id_len, "code id")?;
    let code_id = STANDARD
        .decode(encoded.as_bytes())
        .ok()
        .and_then(|raw| String::from_utf8(raw).ok())
        .ok_or_else(|| CoreError::InvalidBlob("failed to decode code id".into()))?;

    need(buf, 1, "separator")?;
    if buf.get_u8() != OBJECT_NULL_BYTE {
        return Err(CoreError::InvalidBlob("separator not found".into()));
    }

    Ok((
        ObjectHeader {
            partition,
            is_native_language,
            language_id,
            language_version_id,
            language_type_id,
            code_id,
            code_type_id,
        },
        buf.to_vec(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_with_ff_in_fixed_fields() {
        let header = ObjectHeader::new("/billing", false, 0xFF, 0xFFFF_FFFF, 255, "id-1", 0xFF00);
        let body = serialize_blob(&header, &[0xFF, 1, 2]).unwrap();
        let (parsed, data) = deserialize_blob(&body).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(data, vec![0xFF, 1, 2]);
    }

    #[test]
    fn test_truncated_header() {
        let header = ObjectHeader::new("/", true, 1, 2, 3, "code", 4);
        let body = serialize_blob(&header, b"data").unwrap();
        assert!(deserialize_blob(&body[..10]).is_err());
        assert!(deserialize_blob(&[]).is_err());
    }

    #[test]
    fn test_wrong_separator() {
        let header = ObjectHeader::new("/", true, 1, 2, 3, "code", 4);
        let mut body = serialize_blob(&header, b"data").unwrap();
        let sep = body.len() - 5;
        body[sep] = 0;
        assert!(deserialize_blob(&body).is_err());
    }
}
