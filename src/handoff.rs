//! # Buffer Handoff Module
//!
//! Moves full sample buffers from the tick thread to the writer thread.
//!
//! ## Protocol
//! - The tick thread owns the *active* buffer outright and appends without locking
//! - A full active buffer is moved into the single *pending* slot under the lock
//!   and replaced by a fresh, empty buffer of the same capacity
//! - The writer takes the pending buffer out under the same lock and formats and
//!   writes it after releasing the lock
//! - A single-slot wake channel tells the writer there is work
//!
//! The lock is only ever held for those moves, so a tick never waits on disk I/O.
//! Every acquisition is bounded with `try_lock_for`.
//!
//! ## Overrun policy
//! If the pending slot is still occupied when the next handoff arrives, the
//! handoff is deferred: the tick thread keeps its samples and retries on later
//! ticks, so batches never reorder. The tick thread caps how far its active
//! buffer may grow meanwhile and drops newer samples past that cap.

use crate::sample::SampleBuffer;
use crate::stats::StatsCounters;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::fmt;
use std::mem;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Poll interval while shutdown waits for the writer to empty the pending slot.
const FORCE_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// State guarded by the handoff lock.
#[derive(Debug)]
struct HandoffState {
    pending: Option<SampleBuffer>,
    running: bool,
}

/// What the writer found when it drained the pending slot.
#[derive(Debug)]
pub struct Drained {
    pub batch: Option<SampleBuffer>,
    pub running: bool,
}

/// Result of a producer-side handoff attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffOutcome {
    /// Active buffer moved to pending; caller now holds a fresh buffer
    Swapped,
    /// Lock not acquired in time; caller keeps accumulating
    LockTimeout,
    /// Previous batch still pending; caller keeps accumulating
    Deferred,
    /// Writer has stopped; the batch was thrown away
    Discarded,
}

/// Why the shutdown handoff could not install the final batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceHandoffError {
    LockTimeout,
    PendingNotDrained,
    WriterFailed,
}

impl fmt::Display for ForceHandoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForceHandoffError::LockTimeout => write!(f, "handoff lock not acquired"),
            ForceHandoffError::PendingNotDrained => {
                write!(f, "previous batch was still pending")
            }
            ForceHandoffError::WriterFailed => write!(f, "writer had already stopped"),
        }
    }
}

pub struct HandoffChannel {
    state: Mutex<HandoffState>,
    wake_tx: Sender<()>,
    stats: Arc<StatsCounters>,
}

impl HandoffChannel {
    /// Create a channel and the wake receiver the writer thread parks on.
    pub fn new(stats: Arc<StatsCounters>) -> (Self, Receiver<()>) {
        let (wake_tx, wake_rx) = bounded(1);
        let channel = Self {
            state: Mutex::new(HandoffState {
                pending: None,
                running: true,
            }),
            wake_tx,
            stats,
        };
        (channel, wake_rx)
    }

    /// Try to hand `active` to the writer, waiting at most `timeout` for the lock.
    ///
    /// On [`HandoffOutcome::Swapped`] and [`HandoffOutcome::Discarded`] `active` is
    /// replaced by an empty buffer; otherwise it is left untouched.
    pub fn try_handoff(&self, active: &mut SampleBuffer, timeout: Duration) -> HandoffOutcome {
        if self.writer_failed() {
            let capacity = active.capacity();
            let dropped = mem::replace(active, SampleBuffer::with_capacity(capacity));
            StatsCounters::add(&self.stats.dropped_samples, dropped.len());
            log::warn!(
                "Writer has stopped; discarding {} recorded samples",
                dropped.len()
            );
            return HandoffOutcome::Discarded;
        }

        let Some(mut state) = self.state.try_lock_for(timeout) else {
            StatsCounters::add(&self.stats.lock_timeouts, 1);
            return HandoffOutcome::LockTimeout;
        };

        if state.pending.is_some() {
            drop(state);
            StatsCounters::add(&self.stats.overruns, 1);
            // The writer may have missed a wake; nudge it again.
            self.wake();
            return HandoffOutcome::Deferred;
        }

        let capacity = active.capacity();
        state.pending = Some(mem::replace(active, SampleBuffer::with_capacity(capacity)));
        drop(state);

        StatsCounters::add(&self.stats.batches_handed_off, 1);
        self.wake();
        HandoffOutcome::Swapped
    }

    /// Install the last batch and tell the writer to stop.
    ///
    /// Never merges with an occupied pending slot; instead waits, re-waking the
    /// writer, until the slot empties or `timeout` elapses. On error the batch
    /// is dropped and counted.
    pub fn force_handoff(
        &self,
        last: SampleBuffer,
        timeout: Duration,
    ) -> Result<(), ForceHandoffError> {
        let deadline = Instant::now() + timeout;
        let mut reported = false;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(mut state) = self.state.try_lock_for(remaining) else {
                return Err(self.drop_last(last, ForceHandoffError::LockTimeout));
            };

            if self.writer_failed() {
                state.running = false;
                drop(state);
                return Err(self.drop_last(last, ForceHandoffError::WriterFailed));
            }

            if state.pending.is_none() {
                state.running = false;
                if !last.is_empty() {
                    state.pending = Some(last);
                    StatsCounters::add(&self.stats.batches_handed_off, 1);
                }
                drop(state);
                self.wake();
                return Ok(());
            }
            drop(state);

            if !reported {
                log::error!(
                    "Pending batch was not drained when shutdown began; waiting for the writer"
                );
                reported = true;
            }
            self.wake();

            if Instant::now() >= deadline {
                return Err(self.drop_last(last, ForceHandoffError::PendingNotDrained));
            }
            thread::sleep(FORCE_RETRY_INTERVAL.min(remaining));
        }
    }

    fn drop_last(&self, last: SampleBuffer, reason: ForceHandoffError) -> ForceHandoffError {
        if !last.is_empty() {
            StatsCounters::add(&self.stats.dropped_samples, last.len());
            log::error!("Final {} samples not persisted: {}", last.len(), reason);
        }
        reason
    }

    /// Writer side: take the pending batch, if any, within `timeout`.
    ///
    /// Returns `None` when the lock could not be acquired.
    pub fn take_pending(&self, timeout: Duration) -> Option<Drained> {
        let mut state = self.state.try_lock_for(timeout)?;
        Some(Drained {
            batch: state.pending.take(),
            running: state.running,
        })
    }

    /// Drop whatever batch is still pending, counting it as lost.
    ///
    /// Used once the writer has been abandoned. Returns the number of samples
    /// dropped; if the lock cannot be taken within `timeout` nothing is counted.
    pub fn discard_pending(&self, timeout: Duration) -> usize {
        let Some(batch) = self.take_pending(timeout).and_then(|drained| drained.batch) else {
            return 0;
        };
        StatsCounters::add(&self.stats.dropped_samples, batch.len());
        log::error!("Abandoned batch of {} samples was never written", batch.len());
        batch.len()
    }

    /// Raise the wake signal. A signal already raised is left as is.
    pub fn wake(&self) {
        match self.wake_tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                log::error!("Error waking the file writer thread: it is no longer listening");
            }
        }
    }

    pub fn mark_writer_failed(&self) {
        self.stats.writer_failed.store(true, Ordering::Relaxed);
    }

    pub fn writer_failed(&self) -> bool {
        self.stats.writer_failed.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> &StatsCounters {
        &self.stats
    }

    /// Hold the handoff lock, simulating a stalled peer.
    #[cfg(test)]
    pub(crate) fn hold_lock(&self) -> parking_lot::MutexGuard<'_, impl fmt::Debug> {
        self.state.lock()
    }
}
