//! Arc Assist: always-listening wake word + clap gesture trigger.
//! Main library: logging setup, component wiring, the decision loop.

pub mod audio;
pub mod cancellation;
pub mod claps;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod launcher;
pub mod metrics;
pub mod state_machine;

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use audio::wake::EnergyPatternDetector;
use audio::MicrophoneStream;
use cancellation::ShutdownSignal;
use claps::ClapDetector;
use clock::MonotonicClock;
use config::Config;
use controller::{ExitReason, LoopOptions};
use error::RunError;
use launcher::CommandLauncher;
use metrics::MetricsRegistry;
use state_machine::{ControllerStateMachine, Windows};

/// Initialize tracing. `RUST_LOG` wins; otherwise `debug` picks the crate level.
/// With `log_file`, events are also appended to that file as plain text.
pub fn init_tracing(debug: bool, json: bool, log_file: Option<&Path>) -> std::io::Result<()> {
    let file = match log_file {
        Some(path) => Some(OpenOptions::new().create(true).append(true).open(path)?),
        None => None,
    };
    if let Err(e) = subscriber(debug, json, file).try_init() {
        eprintln!("tracing already initialized: {e}");
    }
    Ok(())
}

fn subscriber(
    debug: bool,
    json: bool,
    file: Option<File>,
) -> impl tracing::Subscriber + Send + Sync + 'static {
    let default_filter = if debug {
        "arc_assist=debug"
    } else {
        "arc_assist=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let console = if json {
        fmt::layer().with_target(true).json().boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };
    let file = file.map(|f| {
        fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(Mutex::new(f))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
}

/// Wire the microphone, built-in wake engine, clap detector and launcher, then
/// run the loop until `shutdown` fires or the device goes away.
pub fn run(config: &Config, shutdown: &ShutdownSignal) -> Result<ExitReason, RunError> {
    config.validate()?;

    info!(
        threshold = config.clap_threshold,
        interval_s = config.clap_interval_secs,
        active_s = config.active_duration_secs,
        followup_s = config.followup_wait_secs,
        "arc-assist starting"
    );

    let wake = EnergyPatternDetector::new(&config.wake);
    let claps = ClapDetector::new(config.clap_threshold, config.clap_interval())
        .with_verbose(config.debug);
    let launcher = CommandLauncher::new(&config.launcher);
    let windows = Windows {
        active: config.active_duration(),
        followup: config.followup_wait(),
    };
    let mut machine = ControllerStateMachine::new(wake, claps, launcher, windows);

    let mut microphone = MicrophoneStream::new(&config.wake, &config.audio);
    let metrics = MetricsRegistry::new();
    let options = LoopOptions {
        frame_budget: config.frame_budget(),
        ..LoopOptions::default()
    };

    controller::run(
        &mut microphone,
        &mut machine,
        &MonotonicClock::new(),
        shutdown,
        &metrics,
        options,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_layer_receives_plain_events() {
        let path = std::env::temp_dir().join(format!("arc-assist-{}.log", uuid::Uuid::new_v4()));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap();

        tracing::subscriber::with_default(subscriber(false, false, Some(file)), || {
            info!(threshold = 1800, "written to the log file");
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(contents.contains("written to the log file"));
        assert!(contents.contains("threshold=1800"));
        assert!(!contents.contains('\x1b'));
    }

    #[test]
    fn unopenable_log_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("arc-assist-{}", uuid::Uuid::new_v4()));
        let missing = dir.join("nested").join("arc_assist.log");
        assert!(init_tracing(false, false, Some(&missing)).is_err());
    }
}
