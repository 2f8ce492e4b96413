use crossbeam_channel::{select, tick, unbounded, Receiver};
use frame_recorder::{Recorder, RecorderConfig, ShutdownOutcome};
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

// Frame rate of the simulated render loop
const TICK_RATE_HZ: u64 = 90;

enum Command {
    Toggle,
    Quit,
}

/// Read commands from stdin: an empty line (or `r`) toggles recording, `q` quits.
fn spawn_input_thread() -> Receiver<Command> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let command = match line.as_deref().map(str::trim) {
                Ok("q") | Ok("quit") | Err(_) => Command::Quit,
                Ok("") | Ok("r") => Command::Toggle,
                Ok(other) => {
                    log::warn!("Unknown command {:?}; press Enter to toggle, q to quit", other);
                    continue;
                }
            };
            let quit = matches!(command, Command::Quit);
            if tx.send(command).is_err() || quit {
                return;
            }
        }
        let _ = tx.send(Command::Quit);
    });
    rx
}

/// Stand-in for an eye tracker: two gaze vectors slowly circling the origin.
fn synthetic_gaze() -> impl FnMut() -> (f64, f64, f64, f64) {
    let started = Instant::now();
    move || {
        let t = started.elapsed().as_secs_f64();
        let (sin, cos) = (t * 0.7).sin_cos();
        (0.25 * cos - 0.03, 0.25 * sin, 0.25 * cos + 0.03, 0.25 * sin)
    }
}

fn load_config() -> Result<RecorderConfig, frame_recorder::ConfigError> {
    match std::env::args_os().nth(1) {
        Some(path) => RecorderConfig::load_from(&PathBuf::from(path)),
        None => RecorderConfig::load(),
    }
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut recorder = match Recorder::start(&config, synthetic_gaze()) {
        Ok(recorder) => recorder,
        Err(e) => {
            log::error!("Recording disabled: {}", e);
            return ExitCode::FAILURE;
        }
    };

    log::info!(
        "Ticking at {} Hz; press Enter to toggle recording, q to quit",
        TICK_RATE_HZ
    );
    let commands = spawn_input_thread();
    let ticker = tick(Duration::from_micros(1_000_000 / TICK_RATE_HZ));

    loop {
        select! {
            recv(ticker) -> _ => recorder.on_tick(),
            recv(commands) -> command => match command {
                Ok(Command::Toggle) => {
                    recorder.toggle().toggle();
                }
                Ok(Command::Quit) | Err(_) => break,
            },
        }
    }

    let outcome = recorder.shutdown();
    let stats = recorder.stats();
    log::info!(
        "Recorded {} samples, wrote {} in {} batches ({} overruns, {} dropped)",
        stats.samples_recorded,
        stats.samples_written,
        stats.batches_written,
        stats.overruns,
        stats.dropped_samples
    );

    match outcome {
        ShutdownOutcome::Clean => ExitCode::SUCCESS,
        ShutdownOutcome::Degraded(_) => ExitCode::FAILURE,
    }
}
