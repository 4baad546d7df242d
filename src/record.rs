//! On-disk log record format: a 7-byte header, a key, and (for live records)
//! a value.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Sentinel `value_len` marking a tombstone; never a valid live length.
pub const TOMBSTONE_SENTINEL: u16 = 0xFFFF;

/// Maximum size of a live value.
pub const MAX_VALUE_LEN: usize = 0xFFFE;

/// Size of the fixed header: crc32c (4B) + key_len (1B) + value_len (2B).
pub const HEADER_LEN: usize = 7;

/// A decoded live record. Tombstones never materialize as an `Entry`: the
/// record codec surfaces them as `None` from [`decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Validates and encodes a live `key`/`value` pair into a single record.
///
/// Returns `BadKeyLength` for `key.len() == 0 || key.len() > 255`, and
/// `BadValueLength` for `value.len() == 0 || value.len() > MAX_VALUE_LEN`
/// (the writer is stricter than the wire format: a wire `value_len` of 0 is
/// representable but this crate's writer never produces one).
pub fn encode(key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
    validate_key(key)?;
    if value.is_empty() || value.len() > MAX_VALUE_LEN {
        return Err(Error::BadValueLength(value.len()));
    }

    Ok(encode_unchecked(key, value.len() as u16, value))
}

/// Validates and encodes a tombstone record for `key`.
pub fn encode_tombstone(key: &[u8]) -> Result<Vec<u8>> {
    validate_key(key)?;
    Ok(encode_unchecked(key, TOMBSTONE_SENTINEL, &[]))
}

fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() || key.len() > 255 {
        return Err(Error::BadKeyLength(key.len()));
    }
    Ok(())
}

fn encode_unchecked(key: &[u8], value_len: u16, value: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(3 + key.len() + value.len());
    body.push(key.len() as u8);
    let mut len_buf = [0u8; 2];
    LittleEndian::write_u16(&mut len_buf, value_len);
    body.extend_from_slice(&len_buf);
    body.extend_from_slice(key);
    body.extend_from_slice(value);

    let crc = crc32c::crc32c(&body);

    let mut record = Vec::with_capacity(HEADER_LEN + key.len() + value.len());
    let mut crc_buf = [0u8; 4];
    LittleEndian::write_u32(&mut crc_buf, crc);
    record.extend_from_slice(&crc_buf);
    record.extend_from_slice(&body);
    record
}

/// A parsed header, ahead of reading the variable-length body.
pub struct Header {
    pub crc: u32,
    pub key_len: u8,
    pub value_len: u16,
}

impl Header {
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.value_len == TOMBSTONE_SENTINEL
    }

    /// Number of value bytes actually stored on disk (0 for a tombstone).
    #[must_use]
    pub fn stored_value_len(&self) -> usize {
        if self.is_tombstone() {
            0
        } else {
            self.value_len as usize
        }
    }

    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Self {
        Self {
            crc: LittleEndian::read_u32(&bytes[0..4]),
            key_len: bytes[4],
            value_len: LittleEndian::read_u16(&bytes[5..7]),
        }
    }
}

/// Decodes a full record (header already split out as `header_bytes`, body
/// as `key || value`). Verifies the CRC when `verify_checksum` is set.
/// Returns `None` for a tombstone.
pub fn decode(
    header: &Header,
    key: &[u8],
    value: &[u8],
    verify_checksum: bool,
) -> Result<Option<Entry>> {
    if verify_checksum {
        let mut body = Vec::with_capacity(3 + key.len() + value.len());
        body.push(header.key_len);
        let mut len_buf = [0u8; 2];
        LittleEndian::write_u16(&mut len_buf, header.value_len);
        body.extend_from_slice(&len_buf);
        body.extend_from_slice(key);
        body.extend_from_slice(value);

        if crc32c::crc32c(&body) != header.crc {
            return Err(Error::BadEntry(format!(
                "crc mismatch: stored {:#010x}, computed {:#010x}",
                header.crc,
                crc32c::crc32c(&body)
            )));
        }
    }

    if header.is_tombstone() {
        return Ok(None);
    }

    Ok(Some(Entry {
        key: key.to_vec(),
        value: value.to_vec(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn encode_decode_live_round_trip() -> Result<()> {
        let record = encode(b"abc", b"123")?;
        let header = Header::decode(record[..HEADER_LEN].try_into().unwrap());
        let key = &record[HEADER_LEN..HEADER_LEN + 3];
        let value = &record[HEADER_LEN + 3..];

        assert!(!header.is_tombstone());
        assert_eq!(header.key_len, 3);
        assert_eq!(header.value_len, 3);

        let entry = decode(&header, key, value, true)?.unwrap();
        assert_eq!(entry.key, b"abc");
        assert_eq!(entry.value, b"123");

        Ok(())
    }

    #[test]
    fn tombstone_has_empty_value_and_sentinel() -> Result<()> {
        let record = encode_tombstone(b"abc")?;
        let header = Header::decode(record[..HEADER_LEN].try_into().unwrap());
        assert!(header.is_tombstone());
        assert_eq!(record.len(), HEADER_LEN + 3);

        let key = &record[HEADER_LEN..];
        let entry = decode(&header, key, &[], true)?;
        assert!(entry.is_none());

        Ok(())
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(matches!(encode(b"", b"v"), Err(Error::BadKeyLength(0))));
        assert!(matches!(encode(b"k", b""), Err(Error::BadValueLength(0))));
        let big_key = vec![0u8; 256];
        assert!(matches!(
            encode(&big_key, b"v"),
            Err(Error::BadKeyLength(256))
        ));
        let big_value = vec![0u8; 0xFFFF];
        assert!(matches!(
            encode(b"k", &big_value),
            Err(Error::BadValueLength(0xFFFF))
        ));
    }

    #[test]
    fn bitflip_in_value_fails_crc() -> Result<()> {
        let mut record = encode(b"k", b"value")?;
        let last = record.len() - 1;
        record[last] ^= 0x01;

        let header = Header::decode(record[..HEADER_LEN].try_into().unwrap());
        let key = &record[HEADER_LEN..HEADER_LEN + 1];
        let value = &record[HEADER_LEN + 1..];

        assert!(decode(&header, key, value, true).is_err());
        Ok(())
    }
}
