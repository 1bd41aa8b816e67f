//! Wake word detection capability.
//! The controller only needs a yes/no per frame plus the frame contract
//! (sample rate, frame length) the audio stream must honour.
//! [`EnergyPatternDetector`] is a placeholder engine that fires on a sharp
//! energy spike; a real keyword-spotting model plugs in behind the same trait.

use crate::config::WakeConfig;
use crate::error::DetectorError;

/// Wake word detector trait (engine adapter).
pub trait WakeDetector {
    /// Run wake detection on exactly `frame_length()` samples.
    fn detect(&mut self, frame: &[i16]) -> Result<bool, DetectorError>;

    /// Sample rate the engine expects, in Hz.
    fn sample_rate(&self) -> u32;

    /// Samples per frame the engine expects.
    fn frame_length(&self) -> usize;

    /// Reset internal state (e.g., when the machine falls back to idle).
    fn reset(&mut self) {}
}

/// RMS energy over a frame of PCM samples.
#[inline]
pub fn compute_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|&s| {
            let f = s as f64;
            f * f
        })
        .sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// Placeholder wake detector that uses simple energy-pattern matching.
pub struct EnergyPatternDetector {
    sample_rate: u32,
    frame_length: usize,
    /// Smoothed energy tracking for spike detection.
    prev_energy: f32,
    /// A frame louder than this multiple of the smoothed energy is a spike.
    spike_ratio: f32,
    /// Normalized spike score at which the frame counts as a wake word.
    min_score: f32,
    /// Energy floor below which spikes are ignored (room noise).
    noise_floor: f32,
}

impl EnergyPatternDetector {
    pub fn new(config: &WakeConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            frame_length: config.frame_length,
            prev_energy: 0.0,
            spike_ratio: config.spike_ratio,
            min_score: config.min_score,
            noise_floor: 100.0,
        }
    }

    /// Spike score in [0.0, 1.0]. Higher = more confident.
    fn score(&mut self, samples: &[i16]) -> f32 {
        let rms = compute_rms(samples);
        let score = if self.prev_energy > self.noise_floor && rms > self.prev_energy * self.spike_ratio
        {
            let ratio = rms / self.prev_energy;
            ((ratio - self.spike_ratio) / self.spike_ratio).clamp(0.0, 1.0)
        } else {
            0.0
        };
        // Exponential moving average for energy tracking
        self.prev_energy = self.prev_energy * 0.9 + rms * 0.1;
        score
    }
}

impl WakeDetector for EnergyPatternDetector {
    fn detect(&mut self, frame: &[i16]) -> Result<bool, DetectorError> {
        if frame.len() != self.frame_length {
            return Err(DetectorError::FrameLength {
                expected: self.frame_length,
                actual: frame.len(),
            });
        }
        Ok(self.score(frame) >= self.min_score)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame_length(&self) -> usize {
        self.frame_length
    }

    fn reset(&mut self) {
        self.prev_energy = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> EnergyPatternDetector {
        EnergyPatternDetector::new(&WakeConfig {
            sample_rate: 16_000,
            frame_length: 4,
            spike_ratio: 3.0,
            min_score: 0.5,
        })
    }

    #[test]
    fn rms_of_constant_signal() {
        assert_eq!(compute_rms(&[]), 0.0);
        assert!((compute_rms(&[300, -300, 300, -300]) - 300.0).abs() < 1e-3);
    }

    #[test]
    fn rejects_wrong_frame_length() {
        let mut d = detector();
        assert_eq!(
            d.detect(&[1, 2, 3]),
            Err(DetectorError::FrameLength {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn fires_on_spike_over_steady_background() {
        let mut d = detector();
        for _ in 0..60 {
            assert_eq!(d.detect(&[400, -400, 400, -400]), Ok(false));
        }
        // smoothed energy ~400, spike ratio 20 → score clamps to 1.0
        assert_eq!(d.detect(&[8000, -8000, 8000, -8000]), Ok(true));
    }

    #[test]
    fn silence_never_fires() {
        let mut d = detector();
        for _ in 0..20 {
            assert_eq!(d.detect(&[0, 0, 0, 0]), Ok(false));
        }
        assert_eq!(d.detect(&[8000, -8000, 8000, -8000]), Ok(false));
    }

    #[test]
    fn reset_forgets_background() {
        let mut d = detector();
        for _ in 0..60 {
            d.detect(&[400, -400, 400, -400]).unwrap();
        }
        d.reset();
        assert_eq!(d.detect(&[8000, -8000, 8000, -8000]), Ok(false));
    }
}
