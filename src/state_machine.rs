//! Controller state machine: Idle → Active → WaitingFollowUp → Idle.
//!
//! Each frame drives exactly one detector: the wake detector while `Idle`, the
//! clap detector while `Active` or `WaitingFollowUp`. Window timeouts are
//! checked before the clap detector runs, and a frame that expires a window is
//! consumed by the timeout.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::audio::wake::WakeDetector;
use crate::claps::{PatternCode, PatternDetector};
use crate::error::{DetectorError, DispatchError};
use crate::launcher::ActionDispatcher;
use crate::metrics::ActivationIds;

/// All possible controller states. `since` is the monotonic time the window opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Active { since: Duration },
    WaitingFollowUp { since: Duration },
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerState::Idle => write!(f, "Idle"),
            ControllerState::Active { since } => write!(f, "Active({:.3}s)", since.as_secs_f64()),
            ControllerState::WaitingFollowUp { since } => {
                write!(f, "WaitingFollowUp({:.3}s)", since.as_secs_f64())
            }
        }
    }
}

impl ControllerState {
    /// Returns whether transitioning from `self` to `next` is valid.
    pub fn can_transition_to(self, next: ControllerState) -> bool {
        matches!(
            (self, next),
            (ControllerState::Idle, ControllerState::Active { .. })
                | (ControllerState::Active { .. }, ControllerState::WaitingFollowUp { .. })
                | (ControllerState::Active { .. }, ControllerState::Idle) // timeout
                | (ControllerState::WaitingFollowUp { .. }, ControllerState::Idle) // timeout or triple
        )
    }
}

/// Actions dispatched on a recognized gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    LaunchPrimarySet,
    OpenSecondaryTarget,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::LaunchPrimarySet => write!(f, "launch_primary_set"),
            Action::OpenSecondaryTarget => write!(f, "open_secondary_target"),
        }
    }
}

/// What one frame did to the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Frame evaluated, nothing recognized.
    Nothing,
    WakeDetected,
    WindowExpired,
    /// A pattern that has no meaning in the current state.
    IgnoredPattern(PatternCode),
    Dispatched {
        action: Action,
        result: Result<(), DispatchError>,
        elapsed: Duration,
    },
    /// Detector failed; the tick counts as "no event".
    DetectorFailed(DetectorError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub from: ControllerState,
    pub to: ControllerState,
    pub outcome: TickOutcome,
}

/// Window lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Windows {
    pub active: Duration,
    pub followup: Duration,
}

pub struct ControllerStateMachine<W, P, A> {
    state: ControllerState,
    windows: Windows,
    wake: W,
    claps: P,
    actions: A,
    activation: Option<ActivationIds>,
    activations: u64,
}

impl<W, P, A> ControllerStateMachine<W, P, A>
where
    W: WakeDetector,
    P: PatternDetector,
    A: ActionDispatcher,
{
    pub fn new(wake: W, claps: P, actions: A, windows: Windows) -> Self {
        Self {
            state: ControllerState::Idle,
            windows,
            wake,
            claps,
            actions,
            activation: None,
            activations: 0,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Frame length the wake engine requires of every frame.
    pub fn frame_length(&self) -> usize {
        self.wake.frame_length()
    }

    pub fn sample_rate(&self) -> u32 {
        self.wake.sample_rate()
    }

    pub fn actions(&self) -> &A {
        &self.actions
    }

    pub fn clap_detector(&self) -> &P {
        &self.claps
    }

    /// Route one frame captured at `now` and apply the resulting transition.
    pub fn on_frame(&mut self, frame: &[i16], now: Duration) -> Tick {
        let from = self.state;
        let outcome = match from {
            ControllerState::Idle => self.on_idle(frame, now),
            ControllerState::Active { since } => self.on_active(frame, now, since),
            ControllerState::WaitingFollowUp { since } => self.on_followup(frame, now, since),
        };
        Tick {
            from,
            to: self.state,
            outcome,
        }
    }

    fn on_idle(&mut self, frame: &[i16], now: Duration) -> TickOutcome {
        match self.wake.detect(frame) {
            Ok(true) => {
                self.activations += 1;
                let ids = ActivationIds::new(self.activations);
                info!(
                    activation_id = %ids.activation_id,
                    sequence = ids.sequence,
                    "wake word detected"
                );
                self.activation = Some(ids);
                self.transition(ControllerState::Active { since: now }, "wake");
                TickOutcome::WakeDetected
            }
            Ok(false) => TickOutcome::Nothing,
            Err(e) => {
                warn!(error = %e, "wake detector failed, tick skipped");
                TickOutcome::DetectorFailed(e)
            }
        }
    }

    fn on_active(&mut self, frame: &[i16], now: Duration, since: Duration) -> TickOutcome {
        if now.saturating_sub(since) > self.windows.active {
            self.go_idle("active_timeout");
            return TickOutcome::WindowExpired;
        }

        match self.claps.detect(frame, now) {
            Ok(PatternCode::Double) => {
                let outcome = self.dispatch(Action::LaunchPrimarySet);
                self.transition(ControllerState::WaitingFollowUp { since: now }, "double_clap");
                outcome
            }
            Ok(PatternCode::Triple) => {
                debug!("triple clap ignored while active");
                TickOutcome::IgnoredPattern(PatternCode::Triple)
            }
            Ok(PatternCode::None) => TickOutcome::Nothing,
            Err(e) => {
                warn!(error = %e, "clap detector failed, tick skipped");
                TickOutcome::DetectorFailed(e)
            }
        }
    }

    fn on_followup(&mut self, frame: &[i16], now: Duration, since: Duration) -> TickOutcome {
        if now.saturating_sub(since) > self.windows.followup {
            self.go_idle("followup_timeout");
            return TickOutcome::WindowExpired;
        }

        match self.claps.detect(frame, now) {
            Ok(PatternCode::Triple) => {
                let outcome = self.dispatch(Action::OpenSecondaryTarget);
                self.go_idle("triple_clap");
                outcome
            }
            Ok(PatternCode::Double) => {
                debug!("double clap ignored while waiting for follow-up");
                TickOutcome::IgnoredPattern(PatternCode::Double)
            }
            Ok(PatternCode::None) => TickOutcome::Nothing,
            Err(e) => {
                warn!(error = %e, "clap detector failed, tick skipped");
                TickOutcome::DetectorFailed(e)
            }
        }
    }

    /// Run an action. Failures are logged and reported but never block the
    /// transition the pattern already implies.
    fn dispatch(&mut self, action: Action) -> TickOutcome {
        let started = Instant::now();
        let result = match action {
            Action::LaunchPrimarySet => self.actions.launch_primary_set(),
            Action::OpenSecondaryTarget => self.actions.open_secondary_target(),
        };
        let elapsed = started.elapsed();
        match &result {
            Ok(()) => info!(action = %action, elapsed_ms = elapsed.as_millis() as u64, "action dispatched"),
            Err(e) => warn!(action = %action, error = %e, "action dispatch failed"),
        }
        TickOutcome::Dispatched {
            action,
            result,
            elapsed,
        }
    }

    fn go_idle(&mut self, reason: &'static str) {
        self.transition(ControllerState::Idle, reason);
        self.activation = None;
        self.wake.reset();
    }

    fn transition(&mut self, next: ControllerState, reason: &'static str) {
        let current = self.state;
        debug_assert!(
            current.can_transition_to(next),
            "invalid transition: {current} -> {next}"
        );
        self.state = next;
        let activation_id = self
            .activation
            .as_ref()
            .map(|ids| ids.activation_id.as_str())
            .unwrap_or("-");
        info!(from = %current, to = %next, reason, activation_id, "state_transition");
    }
}
