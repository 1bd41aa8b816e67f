//! Frame loudness: peak absolute sample value plus a short fixed-capacity history.

/// Number of recent amplitudes kept for the sustained-loudness judgment.
pub const HISTORY_CAPACITY: usize = 10;

/// Fixed-capacity FIFO of recent amplitudes. Pre-allocated, never grows;
/// pushing into a full history evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct AmplitudeHistory {
    samples: [u32; HISTORY_CAPACITY],
    /// Index of the oldest entry.
    head: usize,
    len: usize,
}

impl AmplitudeHistory {
    pub fn new() -> Self {
        Self {
            samples: [0; HISTORY_CAPACITY],
            head: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, amplitude: u32) {
        if self.len < HISTORY_CAPACITY {
            self.samples[(self.head + self.len) % HISTORY_CAPACITY] = amplitude;
            self.len += 1;
        } else {
            self.samples[self.head] = amplitude;
            self.head = (self.head + 1) % HISTORY_CAPACITY;
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Mean of the stored amplitudes, `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.len == 0 {
            return None;
        }
        let sum: u64 = self.iter().map(u64::from).sum();
        Some(sum as f64 / self.len as f64)
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len).map(move |i| self.samples[(self.head + i) % HISTORY_CAPACITY])
    }
}

impl Default for AmplitudeHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Reduces frames to a loudness value and records it in the history.
#[derive(Debug, Default)]
pub struct AmplitudeAnalyzer {
    history: AmplitudeHistory,
}

impl AmplitudeAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Peak absolute sample of `frame`, pushed into the history.
    /// `frame` must be non-empty; callers filter empty reads before this point.
    pub fn observe(&mut self, frame: &[i16]) -> u32 {
        debug_assert!(!frame.is_empty(), "observe() requires a non-empty frame");
        let amplitude = peak_amplitude(frame);
        self.history.push(amplitude);
        amplitude
    }

    pub fn history(&self) -> &AmplitudeHistory {
        &self.history
    }
}

/// Maximum `|sample|` over the frame. `i16::MIN` maps to 32768 without overflow.
#[inline]
pub fn peak_amplitude(frame: &[i16]) -> u32 {
    frame
        .iter()
        .map(|&s| u32::from(s.unsigned_abs()))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_is_max_absolute_value() {
        assert_eq!(peak_amplitude(&[10, -300, 200]), 300);
        assert_eq!(peak_amplitude(&[i16::MIN, 5]), 32768);
        assert_eq!(peak_amplitude(&[0, 0, 0]), 0);
    }

    #[test]
    fn history_evicts_oldest_when_full() {
        let mut history = AmplitudeHistory::new();
        for amp in 0..12u32 {
            history.push(amp);
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        let kept: Vec<u32> = history.iter().collect();
        assert_eq!(kept, (2..12).collect::<Vec<u32>>());
    }

    #[test]
    fn history_mean_tracks_window() {
        let mut history = AmplitudeHistory::new();
        assert_eq!(history.mean(), None);
        history.push(100);
        history.push(300);
        assert_eq!(history.mean(), Some(200.0));
    }

    #[test]
    fn observe_records_into_history() {
        let mut analyzer = AmplitudeAnalyzer::new();
        assert_eq!(analyzer.observe(&[1, -2, 3]), 3);
        assert_eq!(analyzer.observe(&[-9]), 9);
        let kept: Vec<u32> = analyzer.history().iter().collect();
        assert_eq!(kept, vec![3, 9]);
    }
}
