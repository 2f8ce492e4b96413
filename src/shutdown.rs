//! # Shutdown Coordination Module
//!
//! Time-boxed, run-once termination of the recorder.
//!
//! 1. Install the sampler's last buffer as the final batch and clear `running`,
//!    bounded by the shutdown lock timeout
//! 2. Wake the writer and wait for it to exit, bounded by the join timeout
//!
//! If either bound expires the writer is cancelled and detached. In-flight I/O
//! cannot be interrupted, so the degraded path only guarantees that nothing is
//! written twice, not that everything is written. A batch still sitting in the
//! pending slot at that point is discarded and counted as dropped.

use crate::handoff::{ForceHandoffError, HandoffChannel};
use crate::sample::SampleBuffer;
use crate::writer::WriterHandle;
use std::fmt;
use std::time::Duration;

/// How shutdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every handed-off sample reached the sink and the writer exited
    Clean,
    /// Some data may be missing from the output
    Degraded(DegradedReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradedReason {
    /// Handoff lock could not be taken for the final batch
    LockTimeout,
    /// Writer never emptied the pending slot in time
    PendingNotDrained,
    /// Writer had already stopped after a storage error
    WriterFailed,
    /// Writer did not exit within the join bound and was detached
    JoinTimeout,
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradedReason::LockTimeout => write!(f, "could not lock the handoff state"),
            DegradedReason::PendingNotDrained => {
                write!(f, "the writer did not drain the pending batch")
            }
            DegradedReason::WriterFailed => write!(f, "the writer had stopped on a storage error"),
            DegradedReason::JoinTimeout => write!(f, "the writer did not exit in time"),
        }
    }
}

impl From<ForceHandoffError> for DegradedReason {
    fn from(e: ForceHandoffError) -> Self {
        match e {
            ForceHandoffError::LockTimeout => DegradedReason::LockTimeout,
            ForceHandoffError::PendingNotDrained => DegradedReason::PendingNotDrained,
            ForceHandoffError::WriterFailed => DegradedReason::WriterFailed,
        }
    }
}

pub struct ShutdownCoordinator {
    writer: Option<WriterHandle>,
    lock_timeout: Duration,
    join_timeout: Duration,
    outcome: Option<ShutdownOutcome>,
}

impl ShutdownCoordinator {
    pub fn new(writer: WriterHandle, lock_timeout: Duration, join_timeout: Duration) -> Self {
        Self {
            writer: Some(writer),
            lock_timeout,
            join_timeout,
            outcome: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.outcome.is_some()
    }

    /// Flush `last` and stop the writer. Later calls return the first outcome.
    pub fn shutdown(&mut self, channel: &HandoffChannel, last: SampleBuffer) -> ShutdownOutcome {
        if let Some(outcome) = self.outcome {
            if !last.is_empty() {
                log::warn!(
                    "Recorder already shut down; {} late samples not persisted",
                    last.len()
                );
            }
            return outcome;
        }

        log::info!("Shutting down recorder, flushing {} buffered samples", last.len());
        let outcome = self.run(channel, last);
        match outcome {
            ShutdownOutcome::Clean => log::info!("Recorder shut down cleanly"),
            ShutdownOutcome::Degraded(reason) => {
                log::error!("Degraded shutdown: {}; recorded data may be incomplete", reason)
            }
        }
        self.outcome = Some(outcome);
        outcome
    }

    fn run(&mut self, channel: &HandoffChannel, last: SampleBuffer) -> ShutdownOutcome {
        let Some(writer) = self.writer.take() else {
            return ShutdownOutcome::Degraded(DegradedReason::JoinTimeout);
        };

        let handoff = channel.force_handoff(last, self.lock_timeout);
        if let Err(e) = handoff {
            if e != ForceHandoffError::WriterFailed {
                writer.cancel();
                channel.wake();
            }
        }

        let joined = match writer.join_timeout(self.join_timeout) {
            Ok(()) => true,
            Err(writer) => {
                writer.cancel();
                channel.wake();
                log::error!(
                    "Writer thread did not exit within {:?}; detaching it",
                    self.join_timeout
                );
                false
            }
        };

        let outcome = match handoff {
            Err(e) => ShutdownOutcome::Degraded(e.into()),
            Ok(()) if !joined => ShutdownOutcome::Degraded(DegradedReason::JoinTimeout),
            Ok(()) if channel.writer_failed() => {
                ShutdownOutcome::Degraded(DegradedReason::WriterFailed)
            }
            Ok(()) => ShutdownOutcome::Clean,
        };

        if outcome != ShutdownOutcome::Clean {
            // Nobody will drain the slot any more.
            channel.discard_pending(self.lock_timeout);
        }
        outcome
    }
}
