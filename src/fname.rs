//! Encode/decode `<id>.log` and `<id>.hint` segment file names.

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::segment::SegmentId;

pub const LOG_SUFFIX: &str = "log";
pub const HINT_SUFFIX: &str = "hint";

/// The kind of file a segment id names.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FileKind {
    Log,
    Hint,
}

#[must_use]
pub fn log_name(id: SegmentId) -> String {
    format!("{id}.{LOG_SUFFIX}")
}

#[must_use]
pub fn hint_name(id: SegmentId) -> String {
    format!("{id}.{HINT_SUFFIX}")
}

/// Parses a bare file name (no directory component) into its segment id and
/// kind. Rejects leading zeros other than a bare `"0"`, non-decimal digits,
/// an id-digit count over 10, and anything with an unrecognized suffix.
#[must_use]
pub fn parse(name: &str) -> Option<(SegmentId, FileKind)> {
    let (digits, suffix) = name.split_once('.')?;

    if digits.is_empty() || digits.len() > 10 {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let id: u32 = digits.parse().ok()?;

    let kind = match suffix {
        LOG_SUFFIX => FileKind::Log,
        HINT_SUFFIX => FileKind::Hint,
        _ => return None,
    };

    Some((id, kind))
}

/// Enumerates `(id, kind)` pairs for every recognized segment file directly
/// inside `dir`. Unrecognized entries are silently skipped.
pub fn enumerate(dir: &Path) -> Result<Vec<(SegmentId, FileKind)>> {
    let mut out = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };

        if let Some(parsed) = parse(&name) {
            out.push(parsed);
        }
    }

    Ok(out)
}
