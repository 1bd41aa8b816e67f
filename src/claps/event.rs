//! Per-frame clap classification with re-trigger debounce.
//!
//! A frame is a clap candidate when it is louder than the threshold and either
//! rises sharply from the previous frame or stands out against a quiet recent
//! history. Candidates closer than [`DEBOUNCE`] to the last registered clap are
//! the tail of the same physical clap and are suppressed.

use std::time::Duration;

use super::amplitude::AmplitudeHistory;

/// Minimum spacing between two registered claps.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// Frame-to-frame rise, as a fraction of the threshold, that counts as sharp.
const SHARP_JUMP_RATIO: f64 = 0.4;
/// History mean, as a fraction of the threshold, below which the background is quiet.
const QUIET_MEAN_RATIO: f64 = 0.5;
/// Below this many history samples the sustained test votes yes.
const BOOTSTRAP_MIN_HISTORY: usize = 3;

/// Intermediate values of one classification, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClapFeatures {
    pub amplitude: u32,
    pub jump: i64,
    pub loud: bool,
    pub sharp: bool,
    pub sustained: bool,
}

impl ClapFeatures {
    #[inline]
    pub fn is_clap(&self) -> bool {
        self.loud && (self.sharp || self.sustained)
    }
}

#[derive(Debug)]
pub struct ClapEventDetector {
    threshold: f64,
    last_clap_time: Option<Duration>,
}

impl ClapEventDetector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            last_clap_time: None,
        }
    }

    /// Evaluate the clap rule without touching debounce state.
    pub fn features(
        &self,
        amplitude: u32,
        history: &AmplitudeHistory,
        previous_amplitude: u32,
    ) -> ClapFeatures {
        let loud = f64::from(amplitude) > self.threshold;
        let jump = i64::from(amplitude) - i64::from(previous_amplitude);
        let sharp = jump as f64 > self.threshold * SHARP_JUMP_RATIO;
        let sustained = if history.len() < BOOTSTRAP_MIN_HISTORY {
            true
        } else {
            history
                .mean()
                .map_or(true, |mean| mean < self.threshold * QUIET_MEAN_RATIO)
        };
        ClapFeatures {
            amplitude,
            jump,
            loud,
            sharp,
            sustained,
        }
    }

    /// Classify a frame and register it as a clap event if it passes debounce.
    /// Returns true only for registered claps.
    pub fn classify(
        &mut self,
        amplitude: u32,
        history: &AmplitudeHistory,
        previous_amplitude: u32,
        now: Duration,
    ) -> bool {
        let features = self.features(amplitude, history, previous_amplitude);
        features.is_clap() && self.try_register(now)
    }

    /// Debounce gate. Records `now` as the last clap when it passes.
    pub fn try_register(&mut self, now: Duration) -> bool {
        let clear = match self.last_clap_time {
            None => true,
            Some(last) => now.saturating_sub(last) > DEBOUNCE,
        };
        if clear {
            self.last_clap_time = Some(now);
        }
        clear
    }

    pub fn last_clap_time(&self) -> Option<Duration> {
        self.last_clap_time
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_of(values: &[u32]) -> AmplitudeHistory {
        let mut history = AmplitudeHistory::new();
        for &v in values {
            history.push(v);
        }
        history
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn below_threshold_never_claps() {
        let histories = [
            history_of(&[]),
            history_of(&[0, 0, 0, 0]),
            history_of(&[5000; 10]),
            history_of(&[1800, 0]),
        ];
        for history in &histories {
            for amplitude in [0u32, 900, 1799, 1800] {
                let mut detector = ClapEventDetector::new(1800.0);
                assert!(!detector.classify(amplitude, history, 0, ms(1000)));
            }
        }
    }

    #[test]
    fn sharp_rise_claps_over_loud_history() {
        let detector = ClapEventDetector::new(1800.0);
        let history = history_of(&[3000, 3000, 3000, 5000]);
        let f = detector.features(5000, &history, 3000);
        assert!(f.loud && f.sharp && !f.sustained);
        assert!(f.is_clap());
    }

    #[test]
    fn loud_without_rise_or_quiet_background_is_not_a_clap() {
        let detector = ClapEventDetector::new(1800.0);
        let history = history_of(&[2500, 2500, 2500]);
        let f = detector.features(2500, &history, 2500);
        assert!(f.loud);
        assert!(!f.sharp);
        assert!(!f.sustained);
        assert!(!f.is_clap());
    }

    #[test]
    fn short_history_is_permissive() {
        let detector = ClapEventDetector::new(1800.0);
        let history = history_of(&[4000, 4000]);
        let f = detector.features(4000, &history, 4000);
        assert!(f.sustained);
        assert!(f.is_clap());
    }

    #[test]
    fn quiet_background_makes_loud_frame_a_clap() {
        let detector = ClapEventDetector::new(1800.0);
        // mean = (100 * 9 + 2000) / 10 = 290 < 900
        let mut values = vec![100; 9];
        values.push(2000);
        let history = history_of(&values);
        let f = detector.features(2000, &history, 1900);
        assert!(!f.sharp);
        assert!(f.sustained);
        assert!(f.is_clap());
    }

    #[test]
    fn loud_frames_50ms_apart_register_once() {
        let mut detector = ClapEventDetector::new(1800.0);
        let history = history_of(&[0]);
        assert!(detector.classify(6000, &history, 0, ms(2000)));
        assert!(!detector.classify(6000, &history, 0, ms(2050)));
        assert_eq!(detector.last_clap_time(), Some(ms(2000)));
    }

    #[test]
    fn debounce_boundary_is_exclusive() {
        let mut detector = ClapEventDetector::new(1800.0);
        assert!(detector.try_register(ms(0)));
        assert!(!detector.try_register(ms(100)));
        assert!(detector.try_register(ms(101)));
    }

    #[test]
    fn first_clap_is_never_debounced() {
        let mut detector = ClapEventDetector::new(1800.0);
        assert!(detector.try_register(Duration::ZERO));
    }
}
