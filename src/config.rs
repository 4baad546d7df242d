//! Tunable knobs for an open [`crate::Engine`].

use std::time::Duration;

/// Options controlling an [`crate::Engine::open`] call.
///
/// Grouped into a struct (rather than positional arguments) so that future
/// knobs don't break the constructor's signature.
#[derive(Debug, Clone)]
pub struct Options {
    /// Byte size above which an append rotates the active segment onto a
    /// new file. The check is `size() + write > threshold`, so a single
    /// record larger than the threshold still fits in an empty segment.
    pub rotation_threshold: u32,

    /// Whether reads verify the record CRC. Disabling this skips the CRC
    /// check on the full-record read path and always uses the value-only
    /// fast path for `get`.
    pub verify_checksums: bool,

    /// How often the hint-generation worker looks for sealed segments
    /// lacking a hint.
    pub hint_interval: Duration,

    /// How often the merge worker looks for sealed, hinted segments whose
    /// live-data ratio has fallen below `merge_threshold`.
    pub merge_interval: Duration,

    /// Fraction of a sealed segment's bytes that must still be live for the
    /// segment to be left alone; segments at or below this ratio are
    /// merged.
    pub merge_threshold: f64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            rotation_threshold: 128 * 1024 * 1024,
            verify_checksums: false,
            hint_interval: Duration::from_secs(30),
            merge_interval: Duration::from_secs(30),
            merge_threshold: 0.2,
        }
    }
}

impl Options {
    #[must_use]
    pub fn new(rotation_threshold: u32, verify_checksums: bool) -> Self {
        Self {
            rotation_threshold,
            verify_checksums,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn defaults_match_documented_values() {
        let opts = Options::default();
        assert_eq!(opts.hint_interval, Duration::from_secs(30));
        assert_eq!(opts.merge_interval, Duration::from_secs(30));
        assert!((opts.merge_threshold - 0.2).abs() < f64::EPSILON);
        assert!(!opts.verify_checksums);
    }

    #[test]
    fn new_overrides_rotation_and_checksum_only() {
        let opts = Options::new(4096, true);
        assert_eq!(opts.rotation_threshold, 4096);
        assert!(opts.verify_checksums);
        assert_eq!(opts.merge_threshold, Options::default().merge_threshold);
    }
}
