//! The engine facade: `get`/`insert`/`delete`, coordinating the directory,
//! the log writer/reader, the segmented store, and the background workers.

use std::path::PathBuf;
use std::sync::Arc;

use crate::bootstrap;
use crate::config::Options;
use crate::directory::Directory;
use crate::error::Result;
use crate::logfile::{Reader as LogReader, Writer as LogWriter};
use crate::position::Position;
use crate::segment::SegmentedStore;
use crate::worker;

/// Number of times `get` re-consults the directory and retries its read
/// after a short read: a short read can happen if the position the
/// directory held was invalidated by a concurrent merge between the
/// lookup and the read.
const DEFAULT_GET_RETRIES: u32 = 2;

/// An open Bitcask-style store.
///
/// `Engine` owns the segmented store and the in-memory directory; the
/// hint-generation and merge workers hold only cloned `Arc`s to them, never
/// the engine itself, and are cancelled (and joined) before the engine's
/// own fields are dropped — see the field order below, which `Drop` in
/// Rust respects.
pub struct Engine {
    // Workers are dropped first: their `Drop` impl cancels the thread and
    // joins it, so by the time `store`/`directory` start dropping, no
    // worker is touching them anymore.
    hint_worker: Option<worker::Handle>,
    merge_worker: Option<worker::Handle>,
    store: Arc<SegmentedStore>,
    directory: Arc<Directory>,
    verify_checksums: bool,
}

impl Engine {
    /// Opens (creating if necessary) a store at `data_dir`. Equivalent to
    /// `open_with_options(data_dir, Options::new(rotation_threshold, verify_checksums))`.
    pub fn open(data_dir: impl Into<PathBuf>, rotation_threshold: u32, verify_checksums: bool) -> Result<Self> {
        Self::open_with_options(data_dir, Options::new(rotation_threshold, verify_checksums))
    }

    /// Opens a store with the full set of tunable [`Options`].
    pub fn open_with_options(data_dir: impl Into<PathBuf>, options: Options) -> Result<Self> {
        let root = data_dir.into();
        log::debug!("opening bitcask store at {root:?}");

        let store = Arc::new(SegmentedStore::open(root, options.rotation_threshold)?);
        let directory = Arc::new(bootstrap::build(&store)?);

        log::info!("bootstrap complete: {} live keys", directory.len());

        let hint_worker = {
            let store = Arc::clone(&store);
            worker::Handle::spawn("bitcask-hint", options.hint_interval, move |cancel| {
                worker::hint::run_pass(&store, cancel);
            })
        };

        let merge_worker = {
            let store = Arc::clone(&store);
            let directory = Arc::clone(&directory);
            let merge_threshold = options.merge_threshold;
            worker::Handle::spawn("bitcask-merge", options.merge_interval, move |cancel| {
                worker::merge::run_pass(&store, &directory, merge_threshold, cancel);
            })
        };

        Ok(Self {
            hint_worker: Some(hint_worker),
            merge_worker: Some(merge_worker),
            store,
            directory,
            verify_checksums: options.verify_checksums,
        })
    }

    /// Looks up `key` and, if live, writes its value into `out` and
    /// returns `true`. On a miss (or a retried short read along the way)
    /// `out`'s contents are unspecified — only meaningful once this
    /// returns `Ok(true)`.
    pub fn get(&self, key: &[u8], out: &mut Vec<u8>) -> Result<bool> {
        self.get_with_retries(key, out, DEFAULT_GET_RETRIES)
    }

    /// As [`Engine::get`], with an explicit retry budget for the
    /// short-read-after-concurrent-merge case.
    pub fn get_with_retries(&self, key: &[u8], out: &mut Vec<u8>, retries: u32) -> Result<bool> {
        let reader = LogReader::new(&self.store);

        for attempt in 0..=retries {
            let Some(position) = self.directory.get(key) else {
                return Ok(false);
            };

            if self.verify_checksums {
                let key_len = key.len() as u8;
                match reader.read_entry(&position, key_len, true)? {
                    Some(entry) => {
                        *out = entry.value;
                        return Ok(true);
                    }
                    None => {
                        log::debug!("get({key:?}): stale position on attempt {attempt}, retrying");
                        continue;
                    }
                }
            }

            let expected = position.value_len as usize;
            let n = reader.read_value(&position, out)?;
            if n == expected {
                return Ok(true);
            }
            log::debug!("get({key:?}): short read ({n} of {expected}) on attempt {attempt}, retrying");
        }

        Ok(false)
    }

    /// Appends a live record for `key`/`value` and, once durable, updates
    /// the directory to point at it.
    pub fn insert(&self, key: &[u8], value: &[u8]) -> Result<()> {
        do_insert(&self.store, &self.directory, key, value)
    }

    /// Appends a tombstone for `key` and, once durable, removes it from
    /// the directory.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        do_delete(&self.store, &self.directory, key)
    }

    /// Flushes the active segment to durable storage.
    pub fn sync(&self) -> Result<()> {
        self.store.sync()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.directory.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Drop order below is explicit, not left to field declaration
        // order: workers must be cancelled and joined before the store
        // and directory they borrow start dropping.
        self.hint_worker.take();
        self.merge_worker.take();
        if let Err(err) = self.store.sync() {
            log::warn!("final sync on close failed: {err}");
        }
    }
}

/// The shared write path for a live insert: used by [`Engine::insert`] and
/// by the merge worker's re-insert callback, so a merged key is always
/// written and indexed exactly the way a foreground insert would be.
pub(crate) fn do_insert(store: &SegmentedStore, directory: &Directory, key: &[u8], value: &[u8]) -> Result<()> {
    let writer = LogWriter::new(store);
    let position = writer.append(key, value)?;
    directory.upsert(key.to_vec(), position);
    Ok(())
}

/// The shared write path for a tombstone: used by [`Engine::delete`] and
/// by the merge worker when a still-live tombstone must survive its
/// segment's deletion.
pub(crate) fn do_delete(store: &SegmentedStore, directory: &Directory, key: &[u8]) -> Result<()> {
    let writer = LogWriter::new(store);
    writer.append_tombstone(key)?;
    directory.remove(key);
    Ok(())
}

/// The merge worker's reinsert path for a still-live key: appends the
/// relocated copy exactly like [`do_insert`], but the directory update is
/// a compare-and-swap against `expected` (the position inside the segment
/// being merged away) rather than an unconditional overwrite.
///
/// The merge worker is a second source of appends racing the single
/// foreground writer; between its liveness check and this call a
/// foreground write may already have superseded the key. An unconditional
/// upsert here would let the stale relocated copy clobber that newer
/// write. Returns whether the swap happened — `false` means a newer write
/// already won, and the freshly appended copy is simply dead weight left
/// in the active segment for a future merge pass to reclaim.
pub(crate) fn do_merge_reinsert(
    store: &SegmentedStore,
    directory: &Directory,
    key: &[u8],
    value: &[u8],
    expected: Position,
) -> Result<bool> {
    let writer = LogWriter::new(store);
    let position = writer.append(key, value)?;
    Ok(directory.replace_if(key, expected, position))
}
