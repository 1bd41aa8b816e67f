//! Observability: per-frame timing histograms and event counters.
//! Histograms track p50/p95/p99 over the most recent samples.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Identifiers attached to one activation window.
#[derive(Debug, Clone)]
pub struct ActivationIds {
    pub activation_id: String,
    /// Number of activations since start, 1-based.
    pub sequence: u64,
}

impl ActivationIds {
    pub fn new(sequence: u64) -> Self {
        Self {
            activation_id: uuid::Uuid::new_v4().to_string(),
            sequence,
        }
    }
}

/// A span measuring elapsed time from creation to explicit end.
pub struct TimingSpan<'a> {
    name: &'static str,
    start: Instant,
    registry: &'a MetricsRegistry,
}

impl<'a> TimingSpan<'a> {
    pub fn new(name: &'static str, registry: &'a MetricsRegistry) -> Self {
        Self {
            name,
            start: Instant::now(),
            registry,
        }
    }

    /// End the span, recording elapsed duration in microseconds.
    pub fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();
        self.registry.record(self.name, elapsed.as_micros() as f64);
        elapsed
    }
}

/// Fixed-capacity ring buffer for histogram samples.
struct SampleRing {
    samples: Vec<f64>,
    pos: usize,
    count: usize,
    capacity: usize,
}

impl SampleRing {
    fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            pos: 0,
            count: 0,
            capacity,
        }
    }

    fn push(&mut self, value: f64) {
        self.samples[self.pos] = value;
        self.pos = (self.pos + 1) % self.capacity;
        if self.count < self.capacity {
            self.count += 1;
        }
    }

    fn percentile(&self, p: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.samples[..self.count].to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = ((p / 100.0) * (self.count as f64 - 1.0)).round() as usize;
        let idx = idx.min(self.count - 1);
        sorted[idx]
    }
}

/// Stores histograms and counters for all named metrics.
pub struct MetricsRegistry {
    histograms: Mutex<HashMap<&'static str, SampleRing>>,
    counters: Mutex<HashMap<&'static str, u64>>,
    ring_capacity: usize,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(ring_capacity: usize) -> Self {
        Self {
            histograms: Mutex::new(HashMap::new()),
            counters: Mutex::new(HashMap::new()),
            ring_capacity: ring_capacity.max(1),
        }
    }

    /// Record a sample (in microseconds) for the named metric.
    pub fn record(&self, name: &'static str, value_us: f64) {
        let mut hists = self.histograms.lock();
        hists
            .entry(name)
            .or_insert_with(|| SampleRing::new(self.ring_capacity))
            .push(value_us);
        tracing::trace!(metric = name, value_us = value_us, "metric_recorded");
    }

    /// Bump the named counter by one.
    pub fn increment(&self, name: &'static str) {
        *self.counters.lock().entry(name).or_insert(0) += 1;
    }

    pub fn count(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    /// Start a timing span that records on finish.
    pub fn span(&self, name: &'static str) -> TimingSpan<'_> {
        TimingSpan::new(name, self)
    }

    /// Get percentile for a metric (p value 0-100). Returns microseconds.
    pub fn percentile(&self, name: &str, p: f64) -> f64 {
        let hists = self.histograms.lock();
        hists
            .get(name)
            .map(|ring| ring.percentile(p))
            .unwrap_or(0.0)
    }

    /// Generate a summary of all metrics at p50/p95/p99 plus counters.
    pub fn summary(&self) -> MetricsSnapshot {
        let hists = self.histograms.lock();
        let mut timings = HashMap::new();
        for (&name, ring) in hists.iter() {
            timings.insert(
                name.to_string(),
                MetricSummary {
                    p50_us: ring.percentile(50.0),
                    p95_us: ring.percentile(95.0),
                    p99_us: ring.percentile(99.0),
                    count: ring.count,
                },
            );
        }
        let counters = self
            .counters
            .lock()
            .iter()
            .map(|(&name, &value)| (name.to_string(), value))
            .collect();
        MetricsSnapshot { timings, counters }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSummary {
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timings: HashMap<String, MetricSummary>,
    pub counters: HashMap<String, u64>,
}

/// Well-known metric names (constants to avoid typos).
pub mod metric_names {
    pub const FRAME_PROCESSED: &str = "t_frame_processed";
    pub const ACTION_DISPATCH: &str = "t_action_dispatch";
    pub const FRAMES: &str = "frames";
    pub const FRAMES_SKIPPED: &str = "frames_skipped";
    pub const FRAMES_OVER_BUDGET: &str = "frames_over_budget";
    pub const READ_ERRORS: &str = "read_errors";
    pub const DETECTOR_ERRORS: &str = "detector_errors";
    pub const WAKE_DETECTED: &str = "wake_detected";
    pub const PRIMARY_DISPATCHED: &str = "primary_dispatched";
    pub const SECONDARY_DISPATCHED: &str = "secondary_dispatched";
    pub const DISPATCH_FAILED: &str = "dispatch_failed";
}
