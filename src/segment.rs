//! The segmented store: owns every segment file, serves random reads across
//! the whole set, and rotates the active segment by size.
//!
//! Two locks guard disjoint state: one read/write lock over the active
//! segment (id, writer, positional reader), and a second
//! over the map of lazily-opened sealed-segment readers. Rotation runs
//! under the active lock's exclusive mode, so no reader or writer ever
//! observes a half-installed active segment.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::fname::{self, FileKind};
use crate::io::{RandomAccessReader, SequentialWriter};

pub type SegmentId = u32;

/// Where an `append` landed: the segment it went to, and the byte offset
/// the caller's bytes begin at within that segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentOffset {
    pub segment_id: SegmentId,
    pub offset: u32,
}

struct Active {
    id: SegmentId,
    writer: SequentialWriter,
    reader: RandomAccessReader,
}

pub struct SegmentedStore {
    root: PathBuf,
    rotation_threshold: u32,
    active: RwLock<Active>,
    sealed: RwLock<HashMap<SegmentId, Arc<RandomAccessReader>>>,
}

impl SegmentedStore {
    /// Opens (creating if necessary) the segment store rooted at `root`.
    /// The active segment is the one with the highest existing log id, or
    /// `1` if the directory has no segments yet.
    pub fn open(root: PathBuf, rotation_threshold: u32) -> Result<Self> {
        fs::create_dir_all(&root)?;

        let existing = fname::enumerate(&root)?;
        let active_id = existing
            .iter()
            .filter(|(_, kind)| *kind == FileKind::Log)
            .map(|(id, _)| *id)
            .max()
            .unwrap_or(1);

        let path = segment_path(&root, active_id);
        let writer = SequentialWriter::create(&path)?;
        let reader = RandomAccessReader::open_positional(&path)?;

        log::debug!("segment store opened at {root:?}, active segment {active_id}");

        Ok(Self {
            root,
            rotation_threshold,
            active: RwLock::new(Active {
                id: active_id,
                writer,
                reader,
            }),
            sealed: RwLock::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn active_id(&self) -> SegmentId {
        self.active.read().id
    }

    /// Appends `bytes`, rotating to a new active segment first if the
    /// write would otherwise exceed `rotation_threshold`. The size check
    /// happens before the write and uses strict `>`, so the first write to
    /// an empty segment always succeeds even if it alone exceeds the
    /// threshold.
    pub fn append(&self, bytes: &[u8]) -> Result<SegmentOffset> {
        let mut active = self.active.write();

        // Only a non-empty active segment can be rotated away: an empty
        // segment rotating onto another empty segment would never let an
        // over-threshold record land anywhere, so the first write to an
        // empty segment always succeeds regardless of its size.
        if active.writer.size() > 0
            && active.writer.size() + bytes.len() as u64 > u64::from(self.rotation_threshold)
        {
            self.rotate(&mut active)?;
        }

        let offset = active.writer.append(bytes)?;
        active.writer.sync()?;

        Ok(SegmentOffset {
            segment_id: active.id,
            offset: offset as u32,
        })
    }

    fn rotate(&self, active: &mut Active) -> Result<()> {
        let new_id = active.id + 1;
        let path = segment_path(&self.root, new_id);

        let writer = SequentialWriter::create(&path)?;
        let reader = RandomAccessReader::open_positional(&path)?;

        log::debug!("rotating active segment {} -> {new_id}", active.id);

        *active = Active {
            id: new_id,
            writer,
            reader,
        };

        crate::io::fsync_directory(&self.root)?;

        Ok(())
    }

    /// Reads `buf.len()` bytes starting at `offset` within `segment_id`.
    /// Returns `OutOfRange` if `segment_id` is beyond the current active
    /// segment; a short read (including zero) is returned verbatim.
    pub fn read_at(&self, segment_id: SegmentId, offset: u32, buf: &mut [u8]) -> Result<usize> {
        {
            let active = self.active.read();
            if segment_id == active.id {
                return active.reader.read_at(u64::from(offset), buf);
            }
            if segment_id > active.id {
                return Err(Error::OutOfRange(segment_id));
            }
        }

        if let Some(reader) = self.sealed.read().get(&segment_id) {
            return reader.read_at(u64::from(offset), buf);
        }

        let mut sealed = self.sealed.write();
        if let Some(reader) = sealed.get(&segment_id) {
            return reader.read_at(u64::from(offset), buf);
        }

        let path = segment_path(&self.root, segment_id);
        let reader = match RandomAccessReader::open_mapped(&path) {
            Ok(reader) => reader,
            // The segment may have been reclaimed by a merge pass between
            // the caller's directory lookup and this read: a position the
            // directory held an instant ago can point at a file that is
            // already gone. Spec-wise this is a short read, not an error —
            // the engine's `get` retry re-consults the directory and finds
            // the relocated position.
            Err(Error::OpenFailed { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                return Ok(0);
            }
            Err(err) => return Err(err),
        };
        let reader = Arc::new(reader);
        let result = reader.read_at(u64::from(offset), buf);
        sealed.insert(segment_id, reader);
        result
    }

    pub fn sync(&self) -> Result<()> {
        self.active.read().writer.sync()
    }

    /// Deletes a sealed segment's log file and, if present, its hint file.
    /// Must never be called with the active segment's id.
    pub fn delete_sealed(&self, segment_id: SegmentId) -> Result<()> {
        debug_assert_ne!(segment_id, self.active_id(), "cannot delete the active segment");

        self.sealed.write().remove(&segment_id);

        fs::remove_file(segment_path(&self.root, segment_id))?;

        let hint_path = hint_path(&self.root, segment_id);
        if hint_path.exists() {
            fs::remove_file(hint_path)?;
        }

        log::debug!("deleted sealed segment {segment_id}");

        Ok(())
    }

    #[must_use]
    pub fn segment_path(&self, segment_id: SegmentId) -> PathBuf {
        segment_path(&self.root, segment_id)
    }

    #[must_use]
    pub fn hint_path(&self, segment_id: SegmentId) -> PathBuf {
        hint_path(&self.root, segment_id)
    }
}

fn segment_path(root: &Path, id: SegmentId) -> PathBuf {
    root.join(fname::log_name(id))
}

fn hint_path(root: &Path, id: SegmentId) -> PathBuf {
    root.join(fname::hint_name(id))
}
