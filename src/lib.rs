//! An embedded, single-writer/multi-reader persistent key/value store
//! implementing the Bitcask design: every mutation is appended to an
//! immutable log, and an in-memory directory maps each live key to the
//! on-disk location of its current value.
//!
//! The public surface is intentionally small: open a store with
//! [`Engine::open`] (or [`Engine::open_with_options`] for full control via
//! [`Options`]), then call [`Engine::get`], [`Engine::insert`], and
//! [`Engine::delete`]. Everything else — segment rotation, crash recovery,
//! hint generation, and merge/compaction — happens underneath.
//!
//! Out of scope, by design: multi-writer access to the same directory,
//! cross-key transactions, ordered iteration, replication, and network
//! access. A process-level lock guarding a directory against a second
//! concurrent opener is a collaborator left to callers (the `cli` binary
//! does not implement one either).

mod bootstrap;
mod config;
mod directory;
mod engine;
mod error;
mod fname;
mod hint;
mod io;
mod logfile;
mod position;
mod record;
mod segment;
mod worker;

pub use config::Options;
pub use engine::Engine;
pub use error::{Error, Result};
