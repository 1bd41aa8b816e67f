//! arc-assist: say the wake word, then clap.
//!
//! Double clap within the activation window launches the primary set; a
//! follow-up triple clap opens the secondary URL.

use std::path::PathBuf;
use std::process::ExitCode;

use ::clap::Parser;
use tracing::{error, info};

use arc_assist::cancellation::{install_interrupt_handler, ShutdownSignal};
use arc_assist::config::Config;
use arc_assist::controller::ExitReason;

#[derive(Parser, Debug)]
#[command(
    name = "arc-assist",
    version,
    about = "Always-listening wake word + clap gesture trigger"
)]
struct Cli {
    /// JSON config file (defaults to $ARC_ASSIST_CONFIG when set)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Per-frame amplitude diagnostics and debug-level logs
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Also append plain-text logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Peak amplitude a clap must exceed
    #[arg(long)]
    threshold: Option<f64>,

    /// Double-clap interval in seconds
    #[arg(long)]
    interval: Option<f64>,

    /// Seconds clap gestures are evaluated after the wake word
    #[arg(long)]
    active_duration: Option<f64>,

    /// Seconds a triple clap is awaited after the primary action
    #[arg(long)]
    followup_wait: Option<f64>,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(threshold) = self.threshold {
            config.clap_threshold = threshold;
        }
        if let Some(interval) = self.interval {
            config.clap_interval_secs = interval;
        }
        if let Some(active) = self.active_duration {
            config.active_duration_secs = active;
        }
        if let Some(wait) = self.followup_wait {
            config.followup_wait_secs = wait;
        }
        if self.debug {
            config.debug = true;
        }
        if let Some(path) = &self.log_file {
            config.log_file = Some(path.clone());
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    cli.apply(&mut config);
    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    if let Err(e) = arc_assist::init_tracing(config.debug, cli.log_json, config.log_file.as_deref()) {
        eprintln!("error: cannot open log file: {e}");
        return ExitCode::FAILURE;
    }

    let shutdown = ShutdownSignal::new();
    if let Err(e) = install_interrupt_handler(&shutdown) {
        error!(error = %e, "failed to install interrupt handler");
        return ExitCode::FAILURE;
    }

    match arc_assist::run(&config, &shutdown) {
        Ok(ExitReason::Cancelled) => {
            info!("stopped");
            ExitCode::SUCCESS
        }
        Ok(ExitReason::StreamClosed(e)) => {
            error!(error = %e, "audio input lost");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "fatal");
            ExitCode::FAILURE
        }
    }
}
