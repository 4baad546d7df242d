//! Merge (compaction) worker: for every sealed, hinted segment whose
//! live-data fraction has fallen at or below `merge_threshold` (excluding
//! the newest hinted segment, so it never races the hint worker), re-insert
//! the segment's still-live entries through the engine's normal write path
//! and delete the segment.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::directory::Directory;
use crate::engine;
use crate::error::Result;
use crate::fname::{self, FileKind};
use crate::hint::{self, ValuePos};
use crate::io::RandomAccessReader;
use crate::logfile::Reader as LogReader;
use crate::position::Position;
use crate::segment::{SegmentId, SegmentedStore};

/// One pass over every eligible sealed segment.
pub fn run_pass(store: &SegmentedStore, directory: &Directory, merge_threshold: f64, cancel: &AtomicBool) {
    let active_id = store.active_id();

    let entries = match fname::enumerate(store.root()) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("merge worker: failed to list segment directory: {err}");
            return;
        }
    };

    let mut hinted: Vec<SegmentId> = entries
        .iter()
        .filter(|(id, kind)| *kind == FileKind::Hint && *id < active_id)
        .map(|(id, _)| *id)
        .collect();
    hinted.sort_unstable();

    // The newest hinted segment is excluded: merging it could race the hint
    // worker still writing it, or a segment that was only just sealed.
    let Some(candidates) = hinted.len().checked_sub(1).map(|last| &hinted[..last]) else {
        return;
    };

    for &segment_id in candidates {
        if cancel.load(Ordering::Acquire) {
            return;
        }

        match merge_segment(store, directory, segment_id, merge_threshold) {
            Ok(true) => log::info!("merged and reclaimed segment {segment_id}"),
            Ok(false) => log::debug!("segment {segment_id} still above merge threshold"),
            Err(err) => log::warn!("merge failed for segment {segment_id}: {err}"),
        }
    }
}

/// Estimates `segment_id`'s live-data ratio from its hint file; if at or
/// below `merge_threshold`, re-inserts every still-live key and deletes the
/// segment. Returns whether a merge actually happened.
fn merge_segment(
    store: &SegmentedStore,
    directory: &Directory,
    segment_id: SegmentId,
    merge_threshold: f64,
) -> Result<bool> {
    let hint_path = store.hint_path(segment_id);

    let reader = RandomAccessReader::open_mapped(&hint_path)?;
    let (total, valid) = hint::fold(&reader, (0u64, 0u64), |(total, valid), key| {
        let size = entry_size(&key.bytes, key.value_pos);
        let is_valid = key_is_live(directory, segment_id, &key.bytes, key.value_pos);
        (total + size, if is_valid { valid + size } else { valid })
    })?;

    let ratio = if total == 0 { 0.0 } else { valid as f64 / total as f64 };
    if ratio > merge_threshold {
        return Ok(false);
    }

    let reader = RandomAccessReader::open_mapped(&hint_path)?;
    let log_reader = LogReader::new(store);

    let result: Result<()> = hint::fold(&reader, Ok(()), |acc, key| {
        acc.and_then(|()| reinsert_if_live(store, directory, &log_reader, segment_id, key))
    })?;
    result?;

    store.delete_sealed(segment_id)?;

    Ok(true)
}

fn entry_size(key: &[u8], value_pos: Option<ValuePos>) -> u64 {
    key.len() as u64 + value_pos.map_or(0, |vp| vp.value_len as u64)
}

/// A live key's hint entry counts toward `valid` if the directory's current
/// position for that key is exactly this one; a tombstone's hint entry
/// counts toward `valid` iff the directory currently has no entry for the
/// key.
fn key_is_live(directory: &Directory, segment_id: SegmentId, key: &[u8], value_pos: Option<ValuePos>) -> bool {
    match value_pos {
        Some(vp) => directory.points_at(
            key,
            Position {
                segment_id,
                value_offset: vp.value_offset,
                value_len: vp.value_len,
            },
        ),
        None => !directory.contains(key),
    }
}

/// Re-inserts one hint entry if it is still live at the moment of this
/// second pass (liveness may have changed since the estimate pass above).
fn reinsert_if_live(
    store: &SegmentedStore,
    directory: &Directory,
    log_reader: &LogReader<'_>,
    segment_id: SegmentId,
    key: hint::Key,
) -> Result<()> {
    if !key_is_live(directory, segment_id, &key.bytes, key.value_pos) {
        return Ok(());
    }

    match key.value_pos {
        Some(vp) => {
            let position = Position {
                segment_id,
                value_offset: vp.value_offset,
                value_len: vp.value_len,
            };
            let key_len = key.bytes.len() as u8;
            if let Some(entry) = log_reader.read_entry(&position, key_len, true)? {
                let relocated = engine::do_merge_reinsert(store, directory, &entry.key, &entry.value, position)?;
                if !relocated {
                    log::debug!(
                        "merge reinsert from segment {segment_id} superseded by a concurrent write; relocated copy left as dead weight"
                    );
                }
            }
            Ok(())
        }
        None => engine::do_delete(store, directory, &key.bytes),
    }
}
