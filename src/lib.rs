//! Frame-rate telemetry recorder.
//!
//! Samples a timestamp and two 2D vectors once per host tick and persists
//! them to a quoted CSV file from a background writer thread, so the tick
//! never waits on disk I/O.
//!
//! ```no_run
//! use frame_recorder::{Recorder, RecorderConfig};
//!
//! let config = RecorderConfig::default();
//! let mut recorder = Recorder::start(&config, || (0.0, 0.0, 0.0, 0.0))?;
//! recorder.toggle().set(true);
//! for _ in 0..10_000 {
//!     recorder.on_tick();
//! }
//! recorder.shutdown();
//! # Ok::<(), frame_recorder::RecorderError>(())
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod handoff;
pub mod output;
pub mod recorder;
pub mod sample;
pub mod sampler;
pub mod shutdown;
pub mod stats;
pub mod writer;

pub use config::RecorderConfig;
pub use error::{ConfigError, RecorderError};
pub use output::SampleSink;
pub use recorder::Recorder;
pub use sample::{Reading, Sample, SampleSource};
pub use sampler::RecordingToggle;
pub use shutdown::{DegradedReason, ShutdownOutcome};
pub use stats::RecorderStats;
