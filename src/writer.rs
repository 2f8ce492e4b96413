//! # Writer Thread Module
//!
//! Background consumer that persists handed-off batches.
//!
//! ## Lifecycle
//! `Waiting -> Draining -> Waiting -> ... -> Draining (final) -> Stopped`
//!
//! - Waiting: parked on the wake channel
//! - Draining: takes the pending batch under a bounded lock, releases the lock,
//!   formats the batch and appends it to the sink in one call
//! - Once the handoff state says the recorder is no longer running, one more
//!   drain picks up anything handed off after the last wake, then the thread exits
//!
//! A storage error stops the writer for good; it still exits cleanly. The
//! cancellation flag is checked between drains and is the only way to stop a
//! writer from outside without its cooperation.

use crate::format::RecordFormatter;
use crate::handoff::HandoffChannel;
use crate::output::SampleSink;
use crate::sample::SampleBuffer;
use crate::stats::StatsCounters;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

enum DrainResult {
    /// Recorder still running; go back to waiting
    Continue,
    /// Recorder stopping; do the final drain and exit
    Finished,
    /// Storage failed; exit without touching the sink again
    Failed,
}

pub struct Writer<K> {
    channel: Arc<HandoffChannel>,
    wake_rx: Receiver<()>,
    sink: K,
    formatter: RecordFormatter,
    lock_timeout: Duration,
    cancel: Arc<AtomicBool>,
}

impl<K: SampleSink + 'static> Writer<K> {
    pub fn new(
        channel: Arc<HandoffChannel>,
        wake_rx: Receiver<()>,
        sink: K,
        formatter: RecordFormatter,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            channel,
            wake_rx,
            sink,
            formatter,
            lock_timeout,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the writer on its own thread.
    pub fn spawn(self) -> io::Result<WriterHandle> {
        let cancel = Arc::clone(&self.cancel);
        let (done_tx, done_rx) = bounded::<()>(1);

        let thread = thread::Builder::new()
            .name("sample-writer".to_string())
            .spawn(move || self.run(done_tx))?;

        Ok(WriterHandle {
            thread,
            done_rx,
            cancel,
        })
    }

    /// Writer thread loop
    ///
    /// `_done` is dropped on return, which is how the handle learns the thread ended.
    fn run(mut self, _done: Sender<()>) {
        log::debug!("Writer thread started");

        loop {
            if self.wake_rx.recv().is_err() {
                log::debug!("Writer thread: wake channel closed");
                break;
            }
            if self.cancelled() {
                self.stop("cancelled");
                return;
            }
            match self.drain() {
                DrainResult::Continue => {}
                DrainResult::Finished => break,
                DrainResult::Failed => {
                    self.stop("storage failure");
                    return;
                }
            }
        }

        // Catch anything handed off after the last wake.
        if !self.cancelled() {
            self.drain();
        }
        self.stop("finished");
    }

    fn drain(&mut self) -> DrainResult {
        let Some(drained) = self.channel.take_pending(self.lock_timeout) else {
            StatsCounters::add(&self.channel.stats().writer_lock_timeouts, 1);
            log::warn!(
                "Write thread couldn't lock the handoff state within {:?}; \
                 the recording side may be holding it too long",
                self.lock_timeout
            );
            return DrainResult::Continue;
        };

        if let Some(batch) = drained.batch {
            if let Err(e) = self.write_batch(&batch) {
                log::error!(
                    "Failed to write {} samples; no further data will be persisted: {}",
                    batch.len(),
                    e
                );
                StatsCounters::add(&self.channel.stats().dropped_samples, batch.len());
                self.channel.mark_writer_failed();
                return DrainResult::Failed;
            }
        }

        if drained.running {
            DrainResult::Continue
        } else {
            DrainResult::Finished
        }
    }

    fn write_batch(&mut self, batch: &SampleBuffer) -> io::Result<()> {
        log::debug!("Writing {} lines", batch.len());
        let block = self.formatter.format_batch(batch);
        self.sink.append(block.as_bytes())?;

        let stats = self.channel.stats();
        StatsCounters::add(&stats.batches_written, 1);
        StatsCounters::add(&stats.samples_written, batch.len());
        Ok(())
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    fn stop(&self, reason: &str) {
        log::info!("Writer thread stopped ({})", reason);
    }
}

/// Owner's side of a running writer thread.
pub struct WriterHandle {
    thread: thread::JoinHandle<()>,
    done_rx: Receiver<()>,
    cancel: Arc<AtomicBool>,
}

impl WriterHandle {
    /// Ask the writer to stop at its next check, whatever is still pending.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait up to `timeout` for the thread to end. Gives the handle back on timeout.
    pub fn join_timeout(self, timeout: Duration) -> Result<(), WriterHandle> {
        match self.done_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => Err(self),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.thread.join().is_err() {
                    log::error!("Writer thread panicked");
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Sample;
    use std::sync::Mutex;

    /// Sink that keeps everything in memory, optionally failing on a given append.
    #[derive(Clone, Default)]
    struct MemorySink {
        blocks: Arc<Mutex<Vec<String>>>,
        fail_on: Option<usize>,
    }

    impl SampleSink for MemorySink {
        fn append(&mut self, block: &[u8]) -> io::Result<()> {
            let mut blocks = self.blocks.lock().unwrap();
            if self.fail_on == Some(blocks.len()) {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            blocks.push(String::from_utf8(block.to_vec()).unwrap());
            Ok(())
        }
    }

    fn batch(range: std::ops::Range<usize>) -> SampleBuffer {
        let mut buffer = SampleBuffer::with_capacity(range.len() + 1);
        for i in range {
            buffer.push(Sample::new(i as f64, (0.0, 0.0, 0.0, 0.0)));
        }
        buffer
    }

    fn start(sink: MemorySink) -> (Arc<HandoffChannel>, WriterHandle) {
        let (channel, wake_rx) = HandoffChannel::new(Arc::new(StatsCounters::default()));
        let channel = Arc::new(channel);
        let writer = Writer::new(
            Arc::clone(&channel),
            wake_rx,
            sink,
            RecordFormatter::new(0, 0, false),
            Duration::from_millis(10),
        );
        (channel, writer.spawn().unwrap())
    }

    fn handoff_and_wait(channel: &HandoffChannel, mut buffer: SampleBuffer, written: u64) {
        channel.try_handoff(&mut buffer, Duration::from_millis(3));
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while channel.stats().snapshot().batches_written < written {
            assert!(std::time::Instant::now() < deadline, "writer never drained");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_batches_written_in_order() {
        let sink = MemorySink::default();
        let (channel, handle) = start(sink.clone());

        handoff_and_wait(&channel, batch(0..3), 1);
        handoff_and_wait(&channel, batch(3..5), 2);
        channel
            .force_handoff(batch(5..6), Duration::from_millis(200))
            .unwrap();
        assert!(handle.join_timeout(Duration::from_secs(1)).is_ok());

        let blocks = sink.blocks.lock().unwrap();
        assert_eq!(blocks.len(), 3);
        let firsts: Vec<String> = blocks
            .concat()
            .lines()
            .map(|l| l.split(',').next().unwrap().to_string())
            .collect();
        assert_eq!(firsts, vec!["\"0\"", "\"1\"", "\"2\"", "\"3\"", "\"4\"", "\"5\""]);
        assert_eq!(channel.stats().snapshot().samples_written, 6);
    }

    #[test]
    fn test_storage_failure_stops_writer() {
        let sink = MemorySink {
            fail_on: Some(0),
            ..MemorySink::default()
        };
        let (channel, handle) = start(sink.clone());

        let mut buffer = batch(0..4);
        channel.try_handoff(&mut buffer, Duration::from_millis(3));
        assert!(handle.join_timeout(Duration::from_secs(5)).is_ok());

        let stats = channel.stats().snapshot();
        assert!(stats.writer_failed);
        assert_eq!(stats.samples_written, 0);
        assert_eq!(stats.dropped_samples, 4);

        // Later handoffs are discarded rather than queued.
        let mut later = batch(4..6);
        channel.try_handoff(&mut later, Duration::from_millis(3));
        assert_eq!(channel.stats().snapshot().dropped_samples, 6);
        assert!(sink.blocks.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cancelled_writer_exits_without_draining() {
        let sink = MemorySink::default();
        let (channel, handle) = start(sink.clone());

        handle.cancel();
        let mut buffer = batch(0..2);
        channel.try_handoff(&mut buffer, Duration::from_millis(3));

        assert!(handle.join_timeout(Duration::from_secs(1)).is_ok());
        assert!(sink.blocks.lock().unwrap().is_empty());
    }

    #[test]
    fn test_join_timeout_returns_handle_while_running() {
        let (channel, handle) = start(MemorySink::default());
        let handle = handle.join_timeout(Duration::from_millis(10)).err().unwrap();
        assert!(!handle.is_finished());

        channel
            .force_handoff(SampleBuffer::default(), Duration::from_millis(200))
            .unwrap();
        assert!(handle.join_timeout(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_lock_timeout_keeps_batch_for_next_wake() {
        let sink = MemorySink::default();
        let (channel, wake_rx) = HandoffChannel::new(Arc::new(StatsCounters::default()));
        let channel = Arc::new(channel);
        let writer = Writer::new(
            Arc::clone(&channel),
            wake_rx,
            sink.clone(),
            RecordFormatter::new(0, 0, false),
            Duration::from_millis(10),
        );

        // Batch is pending and the wake already raised before the writer runs.
        let mut buffer = batch(0..3);
        channel.try_handoff(&mut buffer, Duration::from_millis(3));
        let guard = channel.hold_lock();
        let handle = writer.spawn().unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while channel.stats().snapshot().writer_lock_timeouts == 0 {
            assert!(std::time::Instant::now() < deadline, "writer never tried the lock");
            thread::sleep(Duration::from_millis(1));
        }
        drop(guard);
        assert!(sink.blocks.lock().unwrap().is_empty());

        channel.wake();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while channel.stats().snapshot().batches_written < 1 {
            assert!(std::time::Instant::now() < deadline, "writer never retried");
            thread::sleep(Duration::from_millis(1));
        }
        channel
            .force_handoff(SampleBuffer::default(), Duration::from_millis(200))
            .unwrap();
        assert!(handle.join_timeout(Duration::from_secs(1)).is_ok());

        let blocks = sink.blocks.lock().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].lines().count(), 3);
        let stats = channel.stats().snapshot();
        assert_eq!(stats.writer_lock_timeouts, 1);
        assert_eq!(stats.samples_written, 3);
    }
}
