use std::io;

use thiserror::Error;

/// Errors surfaced by the store.
///
/// `NotFound` is deliberately absent: a missing key is represented as
/// `Ok(false)` from [`crate::Engine::get`], never as an error.
#[derive(Error, Debug)]
pub enum Error {
    /// Any underlying file read/write/sync failure.
    #[error("I/O error - {0}")]
    Io(#[from] io::Error),

    /// A log or hint record was short or failed its CRC check.
    #[error("bad entry: {0}")]
    BadEntry(String),

    /// A write attempted a key of length 0 or greater than 255.
    #[error("bad key length {0} (must be in 1..=255)")]
    BadKeyLength(usize),

    /// A write attempted a value of length 0, or of length >= 0xFFFF.
    #[error("bad value length {0} (must be in 1..=0xFFFE)")]
    BadValueLength(usize),

    /// A read was attempted against a segment id greater than the active one.
    #[error("segment {0} is out of range")]
    OutOfRange(u32),

    /// The database directory or one of its files could not be opened or created.
    #[error("failed to open database at {path}: {source}")]
    OpenFailed {
        path: std::path::PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
