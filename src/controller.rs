//! The decision loop: read a frame, route it through the state machine, repeat.
//!
//! Single-threaded and synchronous. The only blocking point is the frame read;
//! cancellation is observed between frames. The audio device is held by a
//! [`StreamGuard`] so it is released on every exit path, including a panic in
//! the loop body.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::audio::wake::WakeDetector;
use crate::audio::{AudioStream, StreamGuard};
use crate::cancellation::ShutdownSignal;
use crate::claps::PatternDetector;
use crate::clock::Clock;
use crate::error::{AudioError, RunError};
use crate::launcher::ActionDispatcher;
use crate::metrics::{metric_names, MetricsRegistry};
use crate::state_machine::{Action, ControllerStateMachine, TickOutcome};

/// Loop tuning.
#[derive(Debug, Clone, Copy)]
pub struct LoopOptions {
    /// Real-time budget per frame; slower ticks are counted and logged.
    pub frame_budget: Duration,
    /// Pause after a failed read before trying again.
    pub read_error_backoff: Duration,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            frame_budget: Duration::from_millis(32),
            read_error_backoff: Duration::from_millis(20),
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum ExitReason {
    Cancelled,
    StreamClosed(AudioError),
}

/// Run until `shutdown` is cancelled or the stream reports unrecoverable closure.
/// A stream that fails to start is a fatal error returned before any frame is read.
pub fn run<S, C, W, P, A>(
    stream: &mut S,
    machine: &mut ControllerStateMachine<W, P, A>,
    clock: &C,
    shutdown: &ShutdownSignal,
    metrics: &MetricsRegistry,
    options: LoopOptions,
) -> Result<ExitReason, RunError>
where
    S: AudioStream + ?Sized,
    C: Clock + ?Sized,
    W: WakeDetector,
    P: PatternDetector,
    A: ActionDispatcher,
{
    let mut audio = StreamGuard::start(stream)?;
    info!(
        sample_rate = machine.sample_rate(),
        frame_length = machine.frame_length(),
        "listening"
    );

    let reason = loop {
        if shutdown.is_cancelled() {
            info!("shutdown requested, leaving loop");
            break ExitReason::Cancelled;
        }

        let frame = match audio.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                metrics.increment(metric_names::FRAMES_SKIPPED);
                continue;
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "audio stream closed, leaving loop");
                break ExitReason::StreamClosed(e);
            }
            Err(e) => {
                warn!(error = %e, "audio read failed, retrying");
                metrics.increment(metric_names::READ_ERRORS);
                std::thread::sleep(options.read_error_backoff);
                continue;
            }
        };

        if frame.is_empty() || frame.len() != machine.frame_length() {
            debug!(
                len = frame.len(),
                expected = machine.frame_length(),
                "malformed frame skipped"
            );
            metrics.increment(metric_names::FRAMES_SKIPPED);
            continue;
        }

        let now = clock.now();
        let span = metrics.span(metric_names::FRAME_PROCESSED);
        let tick = machine.on_frame(&frame, now);
        let elapsed = span.finish();
        metrics.increment(metric_names::FRAMES);
        record_outcome(metrics, &tick.outcome);

        if elapsed > options.frame_budget {
            metrics.increment(metric_names::FRAMES_OVER_BUDGET);
            warn!(
                elapsed_us = elapsed.as_micros() as u64,
                budget_us = options.frame_budget.as_micros() as u64,
                state = %tick.to,
                "frame processing exceeded real-time budget"
            );
        }
    };

    drop(audio);

    match serde_json::to_string(&metrics.summary()) {
        Ok(summary) => info!(%summary, "metrics summary"),
        Err(e) => debug!(error = %e, "metrics summary not serializable"),
    }
    Ok(reason)
}

fn record_outcome(metrics: &MetricsRegistry, outcome: &TickOutcome) {
    match outcome {
        TickOutcome::WakeDetected => metrics.increment(metric_names::WAKE_DETECTED),
        TickOutcome::DetectorFailed(_) => metrics.increment(metric_names::DETECTOR_ERRORS),
        TickOutcome::Dispatched {
            action,
            result,
            elapsed,
        } => {
            metrics.record(metric_names::ACTION_DISPATCH, elapsed.as_micros() as f64);
            metrics.increment(match action {
                Action::LaunchPrimarySet => metric_names::PRIMARY_DISPATCHED,
                Action::OpenSecondaryTarget => metric_names::SECONDARY_DISPATCHED,
            });
            if result.is_err() {
                metrics.increment(metric_names::DISPATCH_FAILED);
            }
        }
        TickOutcome::Nothing | TickOutcome::WindowExpired | TickOutcome::IgnoredPattern(_) => {}
    }
}
