//! Directory bootstrap: on open, reconstructs the in-memory key directory
//! from a mix of hint and log segments.

use crate::directory::Directory;
use crate::fname::{self, FileKind};
use crate::hint;
use crate::io::RandomAccessReader;
use crate::logfile::Reader as LogReader;
use crate::position::Position;
use crate::segment::SegmentedStore;
use crate::error::Result;

/// Enumerates every segment, folds its keys (preferring the hint file when
/// one exists) in ascending segment-id order, and returns the resulting
/// directory. Because the fold visits segments oldest-to-newest and the
/// last write always wins, the result matches the logical state at the
/// time the last record was made durable.
pub fn build(store: &SegmentedStore) -> Result<Directory> {
    let directory = Directory::new();

    let mut entries = fname::enumerate(store.root())?;
    entries.sort_by_key(|(id, _)| *id);

    let log_ids: Vec<_> = entries
        .iter()
        .filter(|(_, kind)| *kind == FileKind::Log)
        .map(|(id, _)| *id)
        .collect();
    let hinted: std::collections::HashSet<_> = entries
        .iter()
        .filter(|(_, kind)| *kind == FileKind::Hint)
        .map(|(id, _)| *id)
        .collect();

    let log_reader = LogReader::new(store);

    for id in log_ids {
        log::debug!("bootstrap folding segment {id}, hinted = {}", hinted.contains(&id));

        if hinted.contains(&id) {
            let reader = RandomAccessReader::open_mapped(&store.hint_path(id))?;
            hint::fold(&reader, (), |(), key| {
                apply(&directory, id, key.bytes, key.value_pos.map(|vp| (vp.value_len, vp.value_offset)));
            })?;
        } else {
            log_reader.fold(id, (), |(), key| {
                apply(&directory, id, key.bytes, key.value_pos.map(|vp| (vp.value_len, vp.value_offset)));
            })?;
        }
    }

    Ok(directory)
}

fn apply(directory: &Directory, segment_id: crate::segment::SegmentId, key: Vec<u8>, value_pos: Option<(u16, u32)>) {
    match value_pos {
        Some((value_len, value_offset)) => {
            directory.upsert(
                key,
                Position {
                    segment_id,
                    value_offset,
                    value_len,
                },
            );
        }
        None => directory.remove(&key),
    }
}
