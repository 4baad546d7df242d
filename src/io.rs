//! Byte-oriented I/O abstractions over a file.
//!
//! Three contracts, matching the storage layer's needs: a sequential
//! append-only writer, a random-access reader safe for concurrent use, and
//! (for symmetry) a sequential reader that nothing in this crate exercises.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use memmap2::Mmap;

use crate::error::Result;

/// Appends bytes to a file, tracking its own length.
///
/// Not thread-safe on its own: callers must serialize access (the segmented
/// store does this with its active-segment lock).
pub struct SequentialWriter {
    file: File,
    len: u64,
}

impl SequentialWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| crate::error::Error::OpenFailed {
                path: path.to_path_buf(),
                source,
            })?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }

    /// Appends `bytes` and returns the offset at which they begin.
    ///
    /// On failure nothing is written: the underlying `write_all` either
    /// completes in full or the file's length is left untouched from this
    /// writer's point of view (the OS may have partially written bytes to
    /// disk, but this writer's length counter is only advanced on success,
    /// so a caller retrying after an error will not silently double-append).
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = self.len;
        self.file.write_all(bytes)?;
        self.len += bytes.len() as u64;
        Ok(offset)
    }

    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.len
    }
}

/// Reads bytes at arbitrary offsets; safe for concurrent use by many threads.
pub enum RandomAccessReader {
    /// Used for the active segment, whose length grows under our feet.
    Positional(File),
    /// Used for sealed segments: the file never changes again once mapped.
    Mapped(Mmap),
}

impl RandomAccessReader {
    pub fn open_positional(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| crate::error::Error::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::Positional(file))
    }

    pub fn open_mapped(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| crate::error::Error::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;

        // SAFETY: sealed segment files are never modified or truncated after
        // the store promotes them out of the active slot; the mapping is
        // read-only for the lifetime of this reader.
        let mmap = unsafe { Mmap::map(&file)? };

        Ok(Self::Mapped(mmap))
    }

    /// Reads into `buf` starting at `offset`, returning the number of bytes
    /// read. Reading past the end of the file returns `0` rather than an
    /// error; a short read is a normal outcome the caller must handle.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        match self {
            Self::Positional(file) => read_at_positional(file, offset, buf),
            Self::Mapped(mmap) => {
                let offset = offset as usize;
                if offset >= mmap.len() {
                    return Ok(0);
                }
                let end = (offset + buf.len()).min(mmap.len());
                let n = end - offset;
                buf[..n].copy_from_slice(&mmap[offset..end]);
                Ok(n)
            }
        }
    }
}

#[cfg(unix)]
fn read_at_positional(file: &File, offset: u64, buf: &mut [u8]) -> Result<usize> {
    use std::os::unix::fs::FileExt;
    // `read_at` on unix already returns a short read instead of an error
    // when it hits EOF partway through.
    match file.read_at(buf, offset) {
        Ok(n) => Ok(n),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn read_at_positional(file: &File, offset: u64, buf: &mut [u8]) -> Result<usize> {
    // Portable fallback: seek then read. Not safe to call concurrently with
    // itself on the same `File` handle without external locking on
    // non-unix platforms; the segmented store only uses this path for the
    // single active segment, which is never read concurrently with a
    // rotation.
    let mut file = file.try_clone()?;
    file.seek(SeekFrom::Start(offset))?;
    let mut total = 0;
    loop {
        match file.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(total)
}

/// Unused by the core; defined for symmetry with the other two contracts.
pub struct SequentialReader {
    file: File,
}

impl SequentialReader {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self { file: File::open(path)? })
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.file.read(buf)?)
    }

    pub fn skip(&mut self, offset: u64) -> Result<()> {
        self.file.seek(SeekFrom::Current(offset as i64))?;
        Ok(())
    }
}

/// Atomically rewrites a file: write to a temp file in the same directory,
/// then rename over the target. A reader can never observe a partially
/// written file at `path`.
pub fn rewrite_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let folder = path.parent().expect("path should have a parent");

    let mut temp_file = tempfile::NamedTempFile::new_in(folder)?;
    temp_file.write_all(content)?;
    temp_file.persist(path).map_err(|e| e.error)?;

    let file = File::open(path)?;
    file.sync_all()?;

    Ok(())
}

/// Fsyncs a directory so that a newly created or renamed file within it is
/// durable, not just the file's own contents.
#[cfg(not(target_os = "windows"))]
pub fn fsync_directory(path: &Path) -> Result<()> {
    let file = File::open(path)?;
    debug_assert!(file.metadata()?.is_dir());
    file.sync_all()?;
    Ok(())
}

#[cfg(target_os = "windows")]
pub fn fsync_directory(_path: &Path) -> Result<()> {
    // Cannot fsync a directory handle on Windows.
    Ok(())
}

pub fn file_size(path: &Path) -> Result<u64> {
    Ok(fs::metadata(path)?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn sequential_writer_tracks_offsets() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("a.log");

        let mut w = SequentialWriter::create(&path)?;
        assert_eq!(w.append(b"hello")?, 0);
        assert_eq!(w.append(b"world")?, 5);
        assert_eq!(w.size(), 10);
        w.sync()?;

        Ok(())
    }

    #[test]
    fn random_access_reader_short_read_past_eof() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("a.log");
        std::fs::write(&path, b"hello")?;

        let r = RandomAccessReader::open_positional(&path)?;
        let mut buf = [0u8; 10];
        let n = r.read_at(2, &mut buf)?;
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], b"llo");

        let n = r.read_at(100, &mut buf)?;
        assert_eq!(n, 0);

        Ok(())
    }

    #[test]
    fn mapped_reader_matches_positional() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("a.log");
        std::fs::write(&path, b"0123456789")?;

        let mapped = RandomAccessReader::open_mapped(&path)?;
        let mut buf = [0u8; 4];
        assert_eq!(mapped.read_at(3, &mut buf)?, 4);
        assert_eq!(&buf, b"3456");

        assert_eq!(mapped.read_at(9, &mut buf)?, 1);
        assert_eq!(&buf[..1], b"9");

        Ok(())
    }

    #[test]
    fn atomic_rewrite_replaces_content() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("test.txt");
        std::fs::write(&path, b"asdasdasdasdasd")?;

        rewrite_atomic(&path, b"newcontent")?;

        let content = std::fs::read_to_string(&path)?;
        assert_eq!("newcontent", content);

        Ok(())
    }
}
