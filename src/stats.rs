//! Counters shared between the tick thread and the writer thread.
//!
//! All counters are advisory and use relaxed ordering; they feed logs and
//! [`RecorderStats`] snapshots, never control flow.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct StatsCounters {
    pub samples_recorded: AtomicU64,
    pub batches_handed_off: AtomicU64,
    pub batches_written: AtomicU64,
    pub samples_written: AtomicU64,
    pub overruns: AtomicU64,
    pub lock_timeouts: AtomicU64,
    pub writer_lock_timeouts: AtomicU64,
    pub dropped_samples: AtomicU64,
    pub writer_failed: AtomicBool,
}

impl StatsCounters {
    pub fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RecorderStats {
        RecorderStats {
            samples_recorded: self.samples_recorded.load(Ordering::Relaxed),
            batches_handed_off: self.batches_handed_off.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            samples_written: self.samples_written.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
            writer_lock_timeouts: self.writer_lock_timeouts.load(Ordering::Relaxed),
            dropped_samples: self.dropped_samples.load(Ordering::Relaxed),
            writer_failed: self.writer_failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of recorder activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderStats {
    /// Samples appended by the tick thread
    pub samples_recorded: u64,
    /// Batches moved into the pending slot
    pub batches_handed_off: u64,
    pub batches_written: u64,
    pub samples_written: u64,
    /// Handoffs that found the previous batch still pending
    pub overruns: u64,
    /// Handoff attempts that could not take the lock in time
    pub lock_timeouts: u64,
    /// Wakes on which the writer could not take the lock in time
    pub writer_lock_timeouts: u64,
    /// Samples that will never be written: the writer had stopped, the
    /// backlog limit was reached, or shutdown abandoned them
    pub dropped_samples: u64,
    pub writer_failed: bool,
}
