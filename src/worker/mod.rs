//! Periodic background maintenance: hint generation and merge/compaction.
//!
//! Both workers are cancellable periodic tasks, each on its own OS thread.
//! Cancellation is cooperative: a shared atomic flag is checked before each
//! sleep slice and before each per-segment action. The engine signals
//! cancellation on teardown and waits for the worker's current pass to
//! finish before the store and directory are dropped.

pub mod hint;
pub mod merge;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How finely a worker's interval sleep is chopped up so cancellation is
/// noticed promptly instead of only between whole intervals.
const SLEEP_SLICE: Duration = Duration::from_millis(200);

/// Owns a single periodic worker thread. Dropping a `Handle` cancels the
/// thread and blocks until its current pass completes.
pub struct Handle {
    cancel: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl Handle {
    /// Spawns a thread that calls `pass(&cancel_flag)` every `interval`,
    /// until cancelled. `pass` should check the flag before each
    /// per-segment action and return early when it is set.
    pub fn spawn<F>(name: &str, interval: Duration, mut pass: F) -> Self
    where
        F: FnMut(&AtomicBool) + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_thread = Arc::clone(&cancel);

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while !cancel_thread.load(Ordering::Acquire) {
                    if !sleep_cancellable(interval, &cancel_thread) {
                        break;
                    }
                    pass(&cancel_thread);
                }
            })
            .expect("failed to spawn background worker thread");

        Self {
            cancel,
            join: Some(join),
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Sleeps for `duration` in small slices, returning `false` as soon as
/// `cancel` is observed set (without sleeping out the rest of the
/// interval).
fn sleep_cancellable(duration: Duration, cancel: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}
