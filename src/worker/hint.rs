//! Hint-generation worker: for every sealed segment lacking a hint, folds
//! its keys over the log and writes a hint file.

use std::collections::HashSet;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Result;
use crate::fname::{self, FileKind};
use crate::hint;
use crate::io::SequentialWriter;
use crate::logfile::Reader as LogReader;
use crate::segment::{SegmentId, SegmentedStore};

/// One pass: find every sealed segment (id strictly less than the active
/// one) without a `.hint` sibling and generate one for it. A segment's
/// failure is logged and skipped; it never aborts the rest of the pass.
pub fn run_pass(store: &SegmentedStore, cancel: &AtomicBool) {
    let active_id = store.active_id();

    let entries = match fname::enumerate(store.root()) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("hint worker: failed to list segment directory: {err}");
            return;
        }
    };

    let hinted: HashSet<SegmentId> = entries
        .iter()
        .filter(|(_, kind)| *kind == FileKind::Hint)
        .map(|(id, _)| *id)
        .collect();

    let mut unhinted: Vec<SegmentId> = entries
        .iter()
        .filter(|(id, kind)| *kind == FileKind::Log && *id < active_id && !hinted.contains(id))
        .map(|(id, _)| *id)
        .collect();
    unhinted.sort_unstable();

    for segment_id in unhinted {
        if cancel.load(Ordering::Acquire) {
            return;
        }

        match generate_for_segment(store, segment_id) {
            Ok(()) => log::info!("hint file generated for segment {segment_id}"),
            Err(err) => log::warn!("hint generation failed for segment {segment_id}: {err}"),
        }
    }
}

/// Writes `<segment_id>.hint` for `segment_id` by folding its log. Written
/// to a temporary file in the same directory and renamed into place, so a
/// reader never observes a partially-written hint at the final path.
pub fn generate_for_segment(store: &SegmentedStore, segment_id: SegmentId) -> Result<()> {
    let final_path = store.hint_path(segment_id);
    let tmp_path = final_path.with_extension("hint.tmp");

    {
        let mut sequential = SequentialWriter::create(&tmp_path)?;
        let mut writer = hint::Writer::new(&mut sequential);

        let log_reader = LogReader::new(store);
        let result: Result<()> = log_reader.fold(segment_id, Ok(()), |acc, key| {
            acc.and_then(|()| writer.write(&key.bytes, key.value_pos))
        })?;
        result?;

        writer.finish()?;
    }

    fs::rename(&tmp_path, &final_path)?;
    crate::io::fsync_directory(store.root())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logfile::Writer as LogWriter;
    use std::sync::atomic::AtomicBool;
    use test_log::test;

    #[test]
    fn generates_hint_for_sealed_segment_only() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = SegmentedStore::open(dir.path().to_path_buf(), 8)?;
        let writer = LogWriter::new(&store);

        writer.append(b"a", b"1")?;
        writer.append(b"b", b"2222222")?; // forces rotation
        assert!(store.active_id() > 1);

        let cancel = AtomicBool::new(false);
        run_pass(&store, &cancel);

        assert!(store.hint_path(1).exists());
        assert!(!store.hint_path(store.active_id()).exists());

        Ok(())
    }

    #[test]
    fn hint_fold_matches_log_fold() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = SegmentedStore::open(dir.path().to_path_buf(), 4096)?;
        let writer = LogWriter::new(&store);

        writer.append(b"a", b"1")?;
        writer.append(b"b", b"22")?;
        writer.append_tombstone(b"a")?;

        generate_for_segment(&store, 1)?;

        let log_reader = LogReader::new(&store);
        let log_keys = log_reader.fold(1, Vec::new(), |mut acc, key| {
            acc.push(key);
            acc
        })?;

        let reader = crate::io::RandomAccessReader::open_mapped(&store.hint_path(1))?;
        let hint_keys = hint::fold(&reader, Vec::new(), |mut acc, key| {
            acc.push(key);
            acc
        })?;

        assert_eq!(log_keys, hint_keys);

        Ok(())
    }
}
