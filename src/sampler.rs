//! # Sampler Module
//!
//! Producer side of the recorder. Runs on the host's tick thread once per
//! frame, appends one sample while recording is enabled, and hands full
//! buffers to the writer.
//!
//! A tick never blocks beyond the configured producer lock timeout. A failed
//! handoff keeps the sample just taken until the active buffer reaches its
//! backlog limit; past that, new samples are dropped and counted until the
//! writer catches up.

use crate::handoff::{HandoffChannel, HandoffOutcome};
use crate::sample::{Sample, SampleBuffer, SampleSource};
use crate::stats::StatsCounters;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared "recording enabled" flag.
///
/// Cloned handles can be handed to whatever input toggles recording; the tick
/// thread picks up changes on its next tick.
#[derive(Debug, Clone, Default)]
pub struct RecordingToggle {
    enabled: Arc<AtomicBool>,
}

impl RecordingToggle {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Flip the flag, returning the new state.
    pub fn toggle(&self) -> bool {
        let enabled = !self.enabled.fetch_xor(true, Ordering::Relaxed);
        log::info!(
            "{} data recording...",
            if enabled { "Starting" } else { "Stopping" }
        );
        enabled
    }
}

pub struct Sampler<S> {
    source: S,
    active: SampleBuffer,
    threshold: usize,
    capacity: usize,
    backlog_limit: usize,
    // Samples dropped since the last successful handoff
    shed: usize,
    lock_timeout: Duration,
    epoch: Instant,
    toggle: RecordingToggle,
    channel: Arc<HandoffChannel>,
}

impl<S: SampleSource> Sampler<S> {
    /// `threshold` is clamped to at least one sample. The active buffer never
    /// holds more than `max_backlog_batches` thresholds' worth of samples.
    pub fn new(
        source: S,
        threshold: usize,
        max_backlog_batches: usize,
        lock_timeout: Duration,
        toggle: RecordingToggle,
        channel: Arc<HandoffChannel>,
    ) -> Self {
        let threshold = threshold.max(1);
        let capacity = threshold + 1;
        Self {
            source,
            active: SampleBuffer::with_capacity(capacity),
            threshold,
            capacity,
            backlog_limit: threshold.saturating_mul(max_backlog_batches.max(1)),
            shed: 0,
            lock_timeout,
            epoch: Instant::now(),
            toggle,
            channel,
        }
    }

    /// Record one tick, timestamped with seconds since the sampler was created.
    pub fn on_tick(&mut self) {
        let timestamp = self.epoch.elapsed().as_secs_f64();
        self.on_tick_at(timestamp);
    }

    /// Record one tick with a caller-supplied frame time.
    pub fn on_tick_at(&mut self, timestamp: f64) {
        if !self.toggle.is_enabled() {
            return;
        }

        let reading = self.source.sample();
        self.active.push(Sample::new(timestamp, reading));
        StatsCounters::add(&self.channel.stats().samples_recorded, 1);

        if self.active.len() < self.threshold {
            return;
        }

        match self.channel.try_handoff(&mut self.active, self.lock_timeout) {
            HandoffOutcome::Swapped | HandoffOutcome::Discarded => self.shed = 0,
            HandoffOutcome::LockTimeout => self.hold_backlog("handoff lock was busy"),
            HandoffOutcome::Deferred => {
                self.hold_backlog("writer has not drained the previous batch")
            }
        }
    }

    /// Keep the backlog for the next tick, shedding the newest sample once
    /// the buffer is past its limit.
    fn hold_backlog(&mut self, reason: &str) {
        if self.active.len() <= self.backlog_limit {
            self.report_backlog(reason);
            return;
        }

        let excess = self.active.len() - self.backlog_limit;
        self.active.truncate(self.backlog_limit);
        StatsCounters::add(&self.channel.stats().dropped_samples, excess);
        self.shed += excess;
        if self.shed == excess {
            log::error!(
                "Active buffer reached its limit of {} samples ({}); dropping new samples",
                self.backlog_limit,
                reason
            );
        } else if self.shed % self.threshold == 0 {
            log::error!("{} samples dropped while the writer is behind", self.shed);
        }
    }

    /// Log a failed handoff, escalating once the buffer runs past its slack slot.
    fn report_backlog(&self, reason: &str) {
        let excess = self.active.len() - self.threshold;
        if excess <= 1 {
            log::warn!(
                "Handoff postponed ({}); keeping {} samples in the active buffer",
                reason,
                self.active.len()
            );
        } else if excess == 2 || excess % self.threshold == 0 {
            log::error!(
                "Data slice is {} entries over where it should be ({}); \
                 the writer is not keeping up with recording",
                excess,
                reason
            );
        }
    }

    /// Take the active buffer for the final flush, leaving an empty one behind.
    pub fn take_active(&mut self) -> SampleBuffer {
        mem::replace(&mut self.active, SampleBuffer::with_capacity(self.capacity))
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn toggle(&self) -> &RecordingToggle {
        &self.toggle
    }
}
