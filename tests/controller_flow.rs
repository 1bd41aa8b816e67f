//! End-to-end runs of the decision loop over scripted audio.
//! Real clap detector; scripted stream, wake engine and action recorder.

use std::collections::VecDeque;
use std::time::Duration;

use arc_assist::audio::wake::WakeDetector;
use arc_assist::audio::{AudioStream, Frame};
use arc_assist::cancellation::ShutdownSignal;
use arc_assist::claps::ClapDetector;
use arc_assist::clock::ManualClock;
use arc_assist::controller::{self, ExitReason, LoopOptions};
use arc_assist::error::{AudioError, DetectorError, DispatchError, RunError};
use arc_assist::launcher::ActionDispatcher;
use arc_assist::metrics::{metric_names, MetricsRegistry};
use arc_assist::state_machine::{ControllerState, ControllerStateMachine, Windows};

const FRAME_LEN: usize = 4;
const WAKE: i16 = 7777;

const QUIET: [i16; FRAME_LEN] = [20, -35, 50, -10];
const CLAP: [i16; FRAME_LEN] = [300, -6000, 4200, -90];
const WAKE_FRAME: [i16; FRAME_LEN] = [WAKE, 0, 0, 0];

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

enum Step {
    Frame(u64, Vec<i16>),
    Fail(AudioError),
}

/// Replays frames, moving the shared clock to each frame's timestamp.
/// Requests shutdown once the script runs out.
struct ScriptedStream {
    steps: VecDeque<Step>,
    clock: ManualClock,
    shutdown: ShutdownSignal,
    fail_start: bool,
    starts: usize,
    stops: usize,
}

impl ScriptedStream {
    fn new(steps: Vec<Step>, clock: &ManualClock, shutdown: &ShutdownSignal) -> Self {
        Self {
            steps: steps.into(),
            clock: clock.clone(),
            shutdown: shutdown.clone(),
            fail_start: false,
            starts: 0,
            stops: 0,
        }
    }
}

impl AudioStream for ScriptedStream {
    fn start(&mut self) -> Result<(), AudioError> {
        if self.fail_start {
            return Err(AudioError::NoInputDevice);
        }
        self.starts += 1;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Frame>, AudioError> {
        match self.steps.pop_front() {
            Some(Step::Frame(at, samples)) => {
                self.clock.set(ms(at));
                Ok(Some(samples))
            }
            Some(Step::Fail(e)) => Err(e),
            None => {
                self.shutdown.cancel();
                Ok(None)
            }
        }
    }

    fn stop(&mut self) {
        self.stops += 1;
    }
}

/// Fires on frames that start with the `WAKE` marker.
struct MarkerWake;

impl WakeDetector for MarkerWake {
    fn detect(&mut self, frame: &[i16]) -> Result<bool, DetectorError> {
        Ok(frame.first() == Some(&WAKE))
    }

    fn sample_rate(&self) -> u32 {
        16_000
    }

    fn frame_length(&self) -> usize {
        FRAME_LEN
    }
}

#[derive(Default)]
struct Recorder {
    primary: usize,
    secondary: usize,
    /// Time each primary launch takes.
    delay: Duration,
}

impl ActionDispatcher for Recorder {
    fn launch_primary_set(&mut self) -> Result<(), DispatchError> {
        self.primary += 1;
        std::thread::sleep(self.delay);
        Ok(())
    }

    fn open_secondary_target(&mut self) -> Result<(), DispatchError> {
        self.secondary += 1;
        Ok(())
    }
}

type Machine = ControllerStateMachine<MarkerWake, ClapDetector, Recorder>;

fn machine() -> Machine {
    ControllerStateMachine::new(
        MarkerWake,
        ClapDetector::new(1800.0, ms(700)),
        Recorder::default(),
        Windows {
            active: ms(5000),
            followup: ms(30_000),
        },
    )
}

fn wake(at: u64) -> Step {
    Step::Frame(at, WAKE_FRAME.to_vec())
}

fn quiet(at: u64) -> Step {
    Step::Frame(at, QUIET.to_vec())
}

fn clap(at: u64) -> Step {
    Step::Frame(at, CLAP.to_vec())
}

fn options() -> LoopOptions {
    LoopOptions {
        frame_budget: Duration::from_secs(1),
        read_error_backoff: Duration::ZERO,
    }
}

struct Outcome {
    result: Result<ExitReason, RunError>,
    machine: Machine,
    stream: ScriptedStream,
    metrics: MetricsRegistry,
}

fn run_script(steps: Vec<Step>) -> Outcome {
    run_with(steps, |_| {})
}

fn run_with(steps: Vec<Step>, tweak: impl FnOnce(&mut ScriptedStream)) -> Outcome {
    let clock = ManualClock::new();
    let shutdown = ShutdownSignal::new();
    let mut stream = ScriptedStream::new(steps, &clock, &shutdown);
    tweak(&mut stream);
    let mut machine = machine();
    let metrics = MetricsRegistry::new();
    let result = controller::run(
        &mut stream,
        &mut machine,
        &clock,
        &shutdown,
        &metrics,
        options(),
    );
    Outcome {
        result,
        machine,
        stream,
        metrics,
    }
}

#[test]
fn wake_then_double_clap_launches_primary_once() {
    let out = run_script(vec![
        wake(0),
        quiet(500),
        clap(1000),
        quiet(1150),
        clap(1300),
        quiet(1400),
    ]);

    assert_eq!(out.result.unwrap(), ExitReason::Cancelled);
    assert_eq!(out.machine.actions().primary, 1);
    assert_eq!(out.machine.actions().secondary, 0);
    assert_eq!(
        out.machine.state(),
        ControllerState::WaitingFollowUp { since: ms(1300) }
    );
    assert_eq!(out.metrics.count(metric_names::PRIMARY_DISPATCHED), 1);
    assert_eq!((out.stream.starts, out.stream.stops), (1, 1));
}

#[test]
fn follow_up_triple_opens_secondary_and_returns_to_idle() {
    let out = run_script(vec![
        wake(0),
        quiet(500),
        clap(1000),
        quiet(1150),
        clap(1300),
        // Follow-up: spaced so the first pair is not a double.
        quiet(1400),
        clap(1500),
        quiet(1900),
        clap(2300),
        quiet(2500),
        clap(2700),
        quiet(2900),
    ]);

    assert_eq!(out.result.unwrap(), ExitReason::Cancelled);
    assert_eq!(out.machine.actions().primary, 1);
    assert_eq!(out.machine.actions().secondary, 1);
    assert_eq!(out.machine.state(), ControllerState::Idle);
    assert!(out.machine.clap_detector().clap_times().is_empty());
}

#[test]
fn quiet_activation_times_out_without_actions() {
    let out = run_script(vec![
        wake(0),
        quiet(1000),
        quiet(4000),
        // Past the window: consumed by the timeout, never classified.
        clap(5001),
        clap(5400),
    ]);

    assert_eq!(out.result.unwrap(), ExitReason::Cancelled);
    assert_eq!(out.machine.state(), ControllerState::Idle);
    assert_eq!(out.machine.actions().primary, 0);
    assert_eq!(out.machine.actions().secondary, 0);
    assert_eq!(out.machine.clap_detector().last_clap_time(), None);
}

#[test]
fn claps_before_wake_are_ignored() {
    let out = run_script(vec![clap(0), quiet(100), clap(300), quiet(400)]);

    assert_eq!(out.machine.state(), ControllerState::Idle);
    assert_eq!(out.machine.actions().primary, 0);
    assert_eq!(out.machine.clap_detector().last_clap_time(), None);
}

#[test]
fn malformed_frames_are_skipped() {
    let out = run_script(vec![
        wake(0),
        Step::Frame(200, Vec::new()),
        quiet(500),
        clap(1000),
        Step::Frame(1100, vec![9000, -9000, 9000]),
        quiet(1150),
        clap(1300),
    ]);

    assert_eq!(out.machine.actions().primary, 1);
    // Two malformed frames plus the final empty read.
    assert_eq!(out.metrics.count(metric_names::FRAMES_SKIPPED), 3);
    assert_eq!(out.metrics.count(metric_names::FRAMES), 5);
}

#[test]
fn stream_start_failure_is_fatal() {
    let out = run_with(vec![wake(0)], |s| s.fail_start = true);

    assert!(matches!(
        out.result,
        Err(RunError::Audio(AudioError::NoInputDevice))
    ));
    assert_eq!(out.stream.stops, 0);
    assert_eq!(out.machine.state(), ControllerState::Idle);
}

#[test]
fn closed_stream_ends_the_loop_and_releases_the_device() {
    let out = run_script(vec![
        wake(0),
        Step::Fail(AudioError::Closed("unplugged".into())),
        quiet(100),
    ]);

    assert_eq!(
        out.result.unwrap(),
        ExitReason::StreamClosed(AudioError::Closed("unplugged".into()))
    );
    assert_eq!(out.stream.stops, 1);
    assert_eq!(out.stream.steps.len(), 1);
}

#[test]
fn transient_read_errors_are_retried() {
    let out = run_script(vec![
        wake(0),
        Step::Fail(AudioError::Device("xrun".into())),
        quiet(500),
        clap(1000),
        Step::Fail(AudioError::Device("xrun".into())),
        quiet(1150),
        clap(1300),
    ]);

    assert_eq!(out.result.unwrap(), ExitReason::Cancelled);
    assert_eq!(out.metrics.count(metric_names::READ_ERRORS), 2);
    assert_eq!(out.machine.actions().primary, 1);
}

#[test]
fn slow_dispatch_is_counted_over_budget() {
    let clock = ManualClock::new();
    let shutdown = ShutdownSignal::new();
    let mut stream = ScriptedStream::new(
        vec![wake(0), quiet(500), clap(1000), quiet(1150), clap(1300), quiet(1400)],
        &clock,
        &shutdown,
    );
    let mut machine = ControllerStateMachine::new(
        MarkerWake,
        ClapDetector::new(1800.0, ms(700)),
        Recorder {
            delay: ms(30),
            ..Recorder::default()
        },
        Windows {
            active: ms(5000),
            followup: ms(30_000),
        },
    );
    let metrics = MetricsRegistry::new();
    let options = LoopOptions {
        frame_budget: ms(10),
        read_error_backoff: Duration::ZERO,
    };

    controller::run(&mut stream, &mut machine, &clock, &shutdown, &metrics, options).unwrap();

    assert_eq!(machine.actions().primary, 1);
    assert!(metrics.count(metric_names::FRAMES_OVER_BUDGET) >= 1);
    assert!(metrics.percentile(metric_names::ACTION_DISPATCH, 100.0) >= 30_000.0);
}

#[test]
fn fast_frames_stay_within_budget() {
    let out = run_script(vec![wake(0), quiet(500), quiet(1000)]);
    assert_eq!(out.metrics.count(metric_names::FRAMES), 3);
    assert_eq!(out.metrics.count(metric_names::FRAMES_OVER_BUDGET), 0);
}

#[test]
fn cancelled_before_start_reads_nothing() {
    let clock = ManualClock::new();
    let shutdown = ShutdownSignal::new();
    shutdown.cancel();
    let mut stream = ScriptedStream::new(vec![wake(0)], &clock, &shutdown);
    let mut machine = machine();
    let metrics = MetricsRegistry::new();

    let reason = controller::run(&mut stream, &mut machine, &clock, &shutdown, &metrics, options())
        .unwrap();

    assert_eq!(reason, ExitReason::Cancelled);
    assert_eq!(stream.steps.len(), 1);
    assert_eq!((stream.starts, stream.stops), (1, 1));
}
