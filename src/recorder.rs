//! # Recording Module
//!
//! Entry point the host application talks to. Wires the sampler, the handoff
//! channel, the background writer and the shutdown coordinator together.
//!
//! ## Architecture
//! - **Sampler**: called once per tick on the host's thread, owns the active buffer
//! - **HandoffChannel**: lock-guarded pending slot plus wake signal
//! - **Writer Thread**: formats and appends handed-off batches to the output file
//! - **ShutdownCoordinator**: bounded final flush, run once (also on drop)
//!
//! ## Key Features
//! 1. Non-blocking ticks: data flows sensor -> active buffer -> writer thread -> file
//! 2. Batched writes: one append per `flush_threshold` samples
//! 3. Bounded shutdown: the last partial batch is flushed within the configured timeouts
//!
//! ## Output File
//! ```text
//! frameTime,vectorA x,vectorA y,vectorB x,vectorB y
//! "0.0111111111","0.012000","-0.250000","0.013000","-0.249000"
//! ...
//! ```

use crate::config::RecorderConfig;
use crate::error::RecorderError;
use crate::format::RecordFormatter;
use crate::handoff::HandoffChannel;
use crate::output::{resolve_output_path, FileSink, SampleSink};
use crate::sample::SampleSource;
use crate::sampler::{RecordingToggle, Sampler};
use crate::shutdown::{ShutdownCoordinator, ShutdownOutcome};
use crate::stats::{RecorderStats, StatsCounters};
use crate::writer::Writer;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Records one sample per tick to a delimited text file.
///
/// Safe to drive from a frame loop: `on_tick` never waits on disk I/O and
/// blocks at most for the configured producer lock timeout.
pub struct Recorder<S: SampleSource> {
    sampler: Sampler<S>,
    channel: Arc<HandoffChannel>,
    coordinator: ShutdownCoordinator,
    output_path: Option<PathBuf>,
}

impl<S: SampleSource> Recorder<S> {
    /// Create the output file, write its header and start the writer thread.
    ///
    /// On error nothing is left running and no samples will be recorded.
    pub fn start(config: &RecorderConfig, source: S) -> Result<Self, RecorderError> {
        config.validate()?;

        let path = resolve_output_path(&config.output_path, config.overwrite_existing);
        log::info!("Writing data to {}", path.display());

        let sink = FileSink::create(&path).map_err(|e| {
            log::error!("Error writing header to output file: {}", e);
            e
        })?;

        let mut recorder = Self::launch(config, source, sink)?;
        recorder.output_path = Some(path);
        Ok(recorder)
    }

    /// Start with a caller-provided sink instead of a file.
    pub fn start_with_sink<K: SampleSink + 'static>(
        config: &RecorderConfig,
        source: S,
        sink: K,
    ) -> Result<Self, RecorderError> {
        config.validate()?;
        Self::launch(config, source, sink)
    }

    /// Spawn the writer and build the sampler from an already validated config.
    fn launch<K: SampleSink + 'static>(
        config: &RecorderConfig,
        source: S,
        sink: K,
    ) -> Result<Self, RecorderError> {
        let stats = Arc::new(StatsCounters::default());
        let (channel, wake_rx) = HandoffChannel::new(stats);
        let channel = Arc::new(channel);

        let formatter = RecordFormatter::new(
            config.time_precision_digits,
            config.vector_precision_digits,
            config.force_precision_digits,
        );
        let writer = Writer::new(
            Arc::clone(&channel),
            wake_rx,
            sink,
            formatter,
            config.writer_lock_timeout(),
        )
        .spawn()
        .map_err(RecorderError::SpawnWriter)?;

        let sampler = Sampler::new(
            source,
            config.flush_threshold,
            config.max_backlog_batches,
            config.producer_lock_timeout(),
            RecordingToggle::new(config.start_enabled),
            Arc::clone(&channel),
        );
        let coordinator = ShutdownCoordinator::new(
            writer,
            config.shutdown_lock_timeout(),
            config.shutdown_join_timeout(),
        );

        Ok(Self {
            sampler,
            channel,
            coordinator,
            output_path: None,
        })
    }

    /// Record one tick. Does nothing while recording is disabled or after shutdown.
    pub fn on_tick(&mut self) {
        if self.coordinator.is_done() {
            return;
        }
        self.sampler.on_tick();
    }

    /// Record one tick with the host's own frame time in seconds.
    pub fn on_tick_at(&mut self, timestamp: f64) {
        if self.coordinator.is_done() {
            return;
        }
        self.sampler.on_tick_at(timestamp);
    }

    /// Handle for toggling recording from another thread or input handler.
    pub fn toggle(&self) -> RecordingToggle {
        self.sampler.toggle().clone()
    }

    pub fn is_recording(&self) -> bool {
        self.sampler.toggle().is_enabled()
    }

    /// Samples recorded but not yet handed to the writer
    pub fn buffered(&self) -> usize {
        self.sampler.active_len()
    }

    pub fn stats(&self) -> RecorderStats {
        self.channel.stats().snapshot()
    }

    /// File being written, when started with [`Recorder::start`]
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    /// Flush buffered samples and stop the writer within the configured bounds.
    ///
    /// Idempotent; also runs on drop.
    pub fn shutdown(&mut self) -> ShutdownOutcome {
        let last = self.sampler.take_active();
        self.coordinator.shutdown(&self.channel, last)
    }
}

impl<S: SampleSource> Drop for Recorder<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::HEADER;
    use crate::sample::Reading;
    use std::fs;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    fn config_in(dir: &Path, threshold: usize) -> RecorderConfig {
        RecorderConfig {
            flush_threshold: threshold,
            time_precision_digits: 1,
            vector_precision_digits: 1,
            output_path: dir.join("run.csv"),
            start_enabled: true,
            ..RecorderConfig::default()
        }
    }

    fn source() -> impl FnMut() -> Reading {
        || (0.5, 0.5, 0.5, 0.5)
    }

    fn wait_for_written(recorder: &Recorder<impl SampleSource>, samples: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while recorder.stats().samples_written < samples {
            assert!(Instant::now() < deadline, "writer never caught up");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_recorder_creation() {
        let dir = tempdir().unwrap();
        let recorder = Recorder::start(&config_in(dir.path(), 10), source()).unwrap();
        assert!(recorder.is_recording());
        assert_eq!(recorder.output_path(), Some(dir.path().join("run.csv").as_path()));
        assert_eq!(
            fs::read_to_string(dir.path().join("run.csv")).unwrap(),
            HEADER
        );
    }

    #[test]
    fn test_threshold_flushes_before_next_tick() {
        let dir = tempdir().unwrap();
        let mut recorder = Recorder::start(&config_in(dir.path(), 5), source()).unwrap();

        for i in 0..5 {
            recorder.on_tick_at(i as f64);
        }
        wait_for_written(&recorder, 5);
        let contents = fs::read_to_string(dir.path().join("run.csv")).unwrap();
        assert_eq!(contents.lines().count(), 6);

        recorder.on_tick_at(5.0);
        assert_eq!(recorder.buffered(), 1);
    }

    #[test]
    fn test_shutdown_flushes_partial_batch() {
        let dir = tempdir().unwrap();
        let mut recorder = Recorder::start(&config_in(dir.path(), 100), source()).unwrap();
        for i in 0..7 {
            recorder.on_tick_at(i as f64);
        }

        assert_eq!(recorder.shutdown(), ShutdownOutcome::Clean);
        let contents = fs::read_to_string(dir.path().join("run.csv")).unwrap();
        let lines: Vec<&str> = contents.lines().skip(1).collect();
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[6], "\"6.0\",\"0.5\",\"0.5\",\"0.5\",\"0.5\"");

        // Ticks after shutdown are ignored.
        recorder.on_tick_at(8.0);
        assert_eq!(recorder.buffered(), 0);
        assert_eq!(recorder.shutdown(), ShutdownOutcome::Clean);
    }

    #[test]
    fn test_drop_flushes() {
        let dir = tempdir().unwrap();
        {
            let mut recorder = Recorder::start(&config_in(dir.path(), 100), source()).unwrap();
            recorder.on_tick_at(0.0);
            recorder.on_tick_at(1.0);
        }
        let contents = fs::read_to_string(dir.path().join("run.csv")).unwrap();
        assert_eq!(contents.lines().count(), 3);
    }

    #[test]
    fn test_unwritable_output_disables_recording() {
        let dir = tempdir().unwrap();
        let config = RecorderConfig {
            output_path: dir.path().join("no-such-dir").join("run.csv"),
            ..RecorderConfig::default()
        };
        let result = Recorder::start(&config, source());
        assert!(matches!(result, Err(RecorderError::CreateOutput { .. })));
    }

    #[test]
    fn test_invalid_config_rejected_before_io() {
        let dir = tempdir().unwrap();
        let config = RecorderConfig {
            flush_threshold: 0,
            ..config_in(dir.path(), 1)
        };
        assert!(matches!(
            Recorder::start(&config, source()),
            Err(RecorderError::Config(_))
        ));
        assert!(!dir.path().join("run.csv").exists());
    }

    #[test]
    fn test_start_with_sink_validates_config() {
        struct NullSink;
        impl SampleSink for NullSink {
            fn append(&mut self, _block: &[u8]) -> std::io::Result<()> {
                Ok(())
            }
        }

        let config = RecorderConfig {
            max_backlog_batches: 0,
            ..RecorderConfig::default()
        };
        assert!(matches!(
            Recorder::start_with_sink(&config, source(), NullSink),
            Err(RecorderError::Config(_))
        ));
    }
}
