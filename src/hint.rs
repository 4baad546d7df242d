//! Hint file format and the key-iteration fold over it.
//!
//! One hint record per key in a sealed segment: `key_len` (1B), `value_len`
//! (2B LE, `0xFFFF` tombstone sentinel), `value_offset` (4B LE, position of
//! the value inside the log segment), then the key bytes. Hints omit CRC and
//! value bytes entirely — they only exist to speed up directory
//! reconstruction.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::io::{RandomAccessReader, SequentialWriter};
use crate::record::TOMBSTONE_SENTINEL;

/// Header of one hint record: key_len + value_len + value_offset.
const HINT_HEADER_LEN: usize = 1 + 2 + 4;

/// One key observed while folding a segment (via the log or the hint
/// iterator): its bytes, and where its value lives, if it is live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub bytes: Vec<u8>,
    pub value_pos: Option<ValuePos>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValuePos {
    pub value_len: u16,
    pub value_offset: u32,
}

/// Writes one hint record per key into `writer`. The sequence of `(key,
/// value_pos)` items comes from a log fold over the same segment.
pub struct Writer<'a> {
    writer: &'a mut SequentialWriter,
}

impl<'a> Writer<'a> {
    pub fn new(writer: &'a mut SequentialWriter) -> Self {
        Self { writer }
    }

    pub fn write(&mut self, key: &[u8], value_pos: Option<ValuePos>) -> Result<()> {
        let (value_len, value_offset) = match value_pos {
            Some(pos) => (pos.value_len, pos.value_offset),
            None => (TOMBSTONE_SENTINEL, 0),
        };

        let mut record = Vec::with_capacity(HINT_HEADER_LEN + key.len());
        record.push(key.len() as u8);

        let mut buf2 = [0u8; 2];
        LittleEndian::write_u16(&mut buf2, value_len);
        record.extend_from_slice(&buf2);

        let mut buf4 = [0u8; 4];
        LittleEndian::write_u32(&mut buf4, value_offset);
        record.extend_from_slice(&buf4);

        record.extend_from_slice(key);

        self.writer.append(&record)?;
        Ok(())
    }

    pub fn finish(self) -> Result<()> {
        self.writer.sync()
    }
}

/// Folds `f` over every key in a hint file, reading `reader` sequentially
/// from offset 0. Never reads value bytes: that is the whole point of
/// hints. Terminates normally (no error) the moment a header-boundary read
/// comes up short, i.e. at a complete hint file's end.
pub fn fold<T>(reader: &RandomAccessReader, mut init: T, mut f: impl FnMut(T, Key) -> T) -> Result<T> {
    let mut offset: u64 = 0;

    loop {
        let mut header_buf = [0u8; HINT_HEADER_LEN];
        let n = reader.read_at(offset, &mut header_buf)?;
        if n == 0 {
            break;
        }
        if n < HINT_HEADER_LEN {
            return Err(Error::BadEntry(format!(
                "short hint header read at offset {offset}: got {n} of {HINT_HEADER_LEN} bytes"
            )));
        }

        let key_len = header_buf[0] as usize;
        let value_len = LittleEndian::read_u16(&header_buf[1..3]);
        let value_offset = LittleEndian::read_u32(&header_buf[3..7]);

        let mut key_buf = vec![0u8; key_len];
        let n = reader.read_at(offset + HINT_HEADER_LEN as u64, &mut key_buf)?;
        if n < key_len {
            return Err(Error::BadEntry(format!(
                "short hint key read at offset {offset}: got {n} of {key_len} bytes"
            )));
        }

        let value_pos = if value_len == TOMBSTONE_SENTINEL {
            None
        } else {
            Some(ValuePos {
                value_len,
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

        offset += (HINT_HEADER_LEN + key_len) as u64;
    }

    Ok(init)
}
