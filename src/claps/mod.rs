//! Clap gesture detection.
//! Pipeline: frame → peak amplitude → clap event (debounced) → double/triple pattern.
//!
//! One [`ClapDetector`] lives for the whole run and is reused across activation
//! windows; its clap history is only cleared by a pattern match or by pruning.

pub mod amplitude;
pub mod event;
pub mod pattern;

use std::time::Duration;

use tracing::{debug, trace};

use crate::error::DetectorError;
use amplitude::AmplitudeAnalyzer;
use event::ClapEventDetector;
pub use pattern::{ClapPatternMatcher, PatternCode};

/// Gesture detector capability consumed by the controller.
pub trait PatternDetector {
    /// Process one frame captured at `now` and report any completed pattern.
    fn detect(&mut self, frame: &[i16], now: Duration) -> Result<PatternCode, DetectorError>;
}

/// Clap detector state: amplitude history, debounce, pending clap times.
#[derive(Debug)]
pub struct ClapDetector {
    analyzer: AmplitudeAnalyzer,
    events: ClapEventDetector,
    matcher: ClapPatternMatcher,
    previous_amplitude: u32,
    verbose: bool,
}

impl ClapDetector {
    /// `threshold` in amplitude units, `interval` is the double-clap window.
    pub fn new(threshold: f64, interval: Duration) -> Self {
        Self {
            analyzer: AmplitudeAnalyzer::new(),
            events: ClapEventDetector::new(threshold),
            matcher: ClapPatternMatcher::new(interval),
            previous_amplitude: 0,
            verbose: false,
        }
    }

    /// Log per-frame features at debug level instead of trace.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run one frame through the pipeline.
    ///
    /// `previous_amplitude` is not updated on a frame that completes a pattern,
    /// so the next frame's sharpness test compares against the frame before it.
    pub fn process(&mut self, frame: &[i16], now: Duration) -> Result<PatternCode, DetectorError> {
        if frame.is_empty() {
            return Err(DetectorError::EmptyFrame);
        }

        let amplitude = self.analyzer.observe(frame);
        let features = self
            .events
            .features(amplitude, self.analyzer.history(), self.previous_amplitude);

        if self.verbose {
            debug!(
                amplitude,
                jump = features.jump,
                loud = features.loud,
                sharp = features.sharp,
                sustained = features.sustained,
                "clap_features"
            );
        } else {
            trace!(amplitude, jump = features.jump, "clap_features");
        }

        if features.is_clap() && self.events.try_register(now) {
            let pattern = self.matcher.register(now);
            debug!(
                at_ms = now.as_millis() as u64,
                pending = self.matcher.clap_times().len(),
                pattern = pattern.code(),
                "clap_registered"
            );
            if pattern != PatternCode::None {
                return Ok(pattern);
            }
        }

        self.previous_amplitude = amplitude;
        Ok(PatternCode::None)
    }

    pub fn previous_amplitude(&self) -> u32 {
        self.previous_amplitude
    }

    pub fn clap_times(&self) -> &[Duration] {
        self.matcher.clap_times()
    }

    pub fn last_clap_time(&self) -> Option<Duration> {
        self.events.last_clap_time()
    }
}

impl PatternDetector for ClapDetector {
    fn detect(&mut self, frame: &[i16], now: Duration) -> Result<PatternCode, DetectorError> {
        self.process(frame, now)
    }
}
