//! The log writer and reader: a thin record-level layer over the
//! segmented store.

use crate::error::{Error, Result};
use crate::hint::{Key, ValuePos};
use crate::position::Position;
use crate::record::{self, Entry, Header, HEADER_LEN};
use crate::segment::SegmentedStore;

/// Appends records to the active segment and reports the durable
/// `Position` of each write.
pub struct Writer<'a> {
    store: &'a SegmentedStore,
}

impl<'a> Writer<'a> {
    #[must_use]
    pub fn new(store: &'a SegmentedStore) -> Self {
        Self { store }
    }

    /// Validates and appends a live record, syncing before returning.
    pub fn append(&self, key: &[u8], value: &[u8]) -> Result<Position> {
        let record = record::encode(key, value)?;
        let written = self.store.append(&record)?;
        self.store.sync()?;

        Ok(Position {
            segment_id: written.segment_id,
            value_offset: written.offset + HEADER_LEN as u32 + key.len() as u32,
            value_len: value.len() as u16,
        })
    }

    /// Validates and appends a tombstone, syncing before returning.
    pub fn append_tombstone(&self, key: &[u8]) -> Result<Position> {
        let record = record::encode_tombstone(key)?;
        let written = self.store.append(&record)?;
        self.store.sync()?;

        Ok(Position {
            segment_id: written.segment_id,
            value_offset: written.offset + HEADER_LEN as u32 + key.len() as u32,
            value_len: record::TOMBSTONE_SENTINEL,
        })
    }
}

/// Reads records back out of the segmented store, either the value bytes
/// alone (fast path) or the full record with CRC verification.
pub struct Reader<'a> {
    store: &'a SegmentedStore,
}

impl<'a> Reader<'a> {
    #[must_use]
    pub fn new(store: &'a SegmentedStore) -> Self {
        Self { store }
    }

    /// Reads exactly `position.value_len` bytes at `position.value_offset`.
    /// No CRC check. Returns the number of bytes actually read — a short
    /// read means the caller should retry against a fresh `Position`.
    pub fn read_value(&self, position: &Position, out: &mut Vec<u8>) -> Result<usize> {
        let value_len = position.value_len as usize;
        out.resize(value_len, 0);

        let n = self
            .store
            .read_at(position.segment_id, position.value_offset, out)?;

        out.truncate(n);
        Ok(n)
    }

    /// Reads the full record (header + key + value), verifies CRC if
    /// `verify_checksum`, and returns the decoded entry. `None` means
    /// either a tombstone or a short read past where the record should be.
    pub fn read_entry(
        &self,
        position: &Position,
        key_len: u8,
        verify_checksum: bool,
    ) -> Result<Option<Entry>> {
        let header_offset = position.header_offset(key_len);
        let value_len = if position.value_len == record::TOMBSTONE_SENTINEL {
            0
        } else {
            position.value_len as usize
        };

        let total_len = HEADER_LEN + key_len as usize + value_len;
        let mut buf = vec![0u8; total_len];

        let n = self.store.read_at(position.segment_id, header_offset, &mut buf)?;
        if n < total_len {
            return Ok(None);
        }

        let header_bytes: [u8; HEADER_LEN] = buf[..HEADER_LEN].try_into().expect("fixed size slice");
        let header = Header::decode(&header_bytes);
        let key = &buf[HEADER_LEN..HEADER_LEN + key_len as usize];
        let value = &buf[HEADER_LEN + key_len as usize..];

        record::decode(&header, key, value, verify_checksum)
    }

    /// Folds `f` over every record in `segment_id`, in on-disk order,
    /// skipping value bytes without reading them. Terminates normally when
    /// a header-boundary read comes up short (end of segment); any other
    /// short read is `BadEntry`.
    pub fn fold<T>(
        &self,
        segment_id: crate::segment::SegmentId,
        mut init: T,
        mut f: impl FnMut(T, Key) -> T,
    ) -> Result<T> {
        let mut offset: u32 = 0;

        loop {
            let mut header_buf = [0u8; HEADER_LEN];
            let n = self.store.read_at(segment_id, offset, &mut header_buf)?;
            if n == 0 {
                break;
            }
            if n < HEADER_LEN {
                return Err(Error::BadEntry(format!(
                    "short header read in segment {segment_id} at offset {offset}: got {n} of {HEADER_LEN} bytes"
                )));
            }

            let header = Header::decode(&header_buf);
            let key_len = header.key_len as usize;

            let mut key_buf = vec![0u8; key_len];
            let n = self
                .store
                .read_at(segment_id, offset + HEADER_LEN as u32, &mut key_buf)?;
            if n < key_len {
                return Err(Error::BadEntry(format!(
                    "short key read in segment {segment_id} at offset {offset}"
                )));
            }

            let stored_value_len = header.stored_value_len();
            let value_offset = offset + HEADER_LEN as u32 + key_len as u32;

            let value_pos = if header.is_tombstone() {
                None
            } else {
                Some(ValuePos {
                    value_len: header.value_len,
                    value_offset,
                })
            };

            init = f(
                init,
                Key {
                    bytes: key_buf,
                    value_pos,
                },
            );

            offset = value_offset + stored_value_len as u32;
        }

        Ok(init)
    }
}
