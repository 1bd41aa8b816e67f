//! Folds registered clap timestamps into double/triple gestures.

use std::fmt;
use std::time::Duration;

/// Claps older than 5/2 of the interval can no longer join a pattern;
/// the same span is the triple-clap window.
const WINDOW_NUM: u32 = 5;
const WINDOW_DEN: u32 = 2;

/// Pattern result of one processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternCode {
    None,
    Double,
    Triple,
}

impl PatternCode {
    /// Numeric form (0/2/3), as reported in logs.
    pub fn code(self) -> u8 {
        match self {
            PatternCode::None => 0,
            PatternCode::Double => 2,
            PatternCode::Triple => 3,
        }
    }
}

impl fmt::Display for PatternCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternCode::None => write!(f, "None"),
            PatternCode::Double => write!(f, "Double"),
            PatternCode::Triple => write!(f, "Triple"),
        }
    }
}

#[derive(Debug)]
pub struct ClapPatternMatcher {
    interval: Duration,
    window: Duration,
    clap_times: Vec<Duration>,
}

impl ClapPatternMatcher {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window: interval * WINDOW_NUM / WINDOW_DEN,
            clap_times: Vec::with_capacity(8),
        }
    }

    /// Record a registered clap and test for a pattern. Triple is checked
    /// before double; any match clears every stored clap.
    pub fn register(&mut self, clap_time: Duration) -> PatternCode {
        self.clap_times.push(clap_time);

        let window = self.window;
        self.clap_times.retain(|&t| clap_time.saturating_sub(t) < window);

        let n = self.clap_times.len();
        if n >= 3 && self.clap_times[n - 1].saturating_sub(self.clap_times[n - 3]) < window {
            self.clap_times.clear();
            return PatternCode::Triple;
        }
        if n >= 2 && self.clap_times[n - 1].saturating_sub(self.clap_times[n - 2]) < self.interval {
            self.clap_times.clear();
            return PatternCode::Double;
        }
        PatternCode::None
    }

    /// Pending clap timestamps, oldest first.
    pub fn clap_times(&self) -> &[Duration] {
        &self.clap_times
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
