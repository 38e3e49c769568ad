//! Latency statistics shared by every session task.

use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;

/// Append-only sample of execution durations.
///
/// Every accumulation and every read takes the lock. `sort` must run once
/// after all producers have finished and before `percentile` is queried.
#[derive(Debug, Default)]
pub struct LatencyStats {
    wallclocks: Mutex<Vec<Duration>>,
}

impl LatencyStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, d: Duration) {
        self.wallclocks.lock().push(d);
    }

    pub fn len(&self) -> usize {
        self.wallclocks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sort(&self) {
        self.wallclocks.lock().sort_unstable();
    }

    /// Nearest-rank percentile: element `floor(len * p / 100)` of the sorted
    /// sample, clamped to the last element. `None` for an empty sample.
    pub fn percentile(&self, p: f64) -> Option<Duration> {
        let wallclocks = self.wallclocks.lock();
        if wallclocks.is_empty() {
            return None;
        }
        let p = p.clamp(0.0, 100.0);
        let idx = (wallclocks.len() as f64 * p / 100.0).floor() as usize;
        Some(wallclocks[idx.min(wallclocks.len() - 1)])
    }

    pub fn mean(&self) -> Option<Duration> {
        let wallclocks = self.wallclocks.lock();
        if wallclocks.is_empty() {
            return None;
        }
        let sum: Duration = wallclocks.iter().sum();
        Some(sum / wallclocks.len() as u32)
    }

    /// Sample standard deviation in seconds (divisor `len - 1`).
    pub fn stddev(&self) -> Option<f64> {
        let mean = self.mean()?.as_secs_f64();
        let wallclocks = self.wallclocks.lock();
        if wallclocks.len() < 2 {
            return None;
        }
        let total: f64 = wallclocks
            .iter()
            .map(|d| (d.as_secs_f64() - mean).powi(2))
            .sum();
        Some((total / (wallclocks.len() - 1) as f64).sqrt())
    }

    /// Sorts the sample and derives the figures printed in the final report.
    pub fn summary(&self) -> LatencySummary {
        self.sort();
        LatencySummary {
            count: self.len(),
            median: self.percentile(50.0),
            mean: self.mean(),
            stddev: self.stddev().map(Duration::from_secs_f64),
            p90: self.percentile(90.0),
            p95: self.percentile(95.0),
            p99: self.percentile(99.0),
            p999: self.percentile(99.9),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: usize,
    pub median: Option<Duration>,
    pub mean: Option<Duration>,
    pub stddev: Option<Duration>,
    pub p90: Option<Duration>,
    pub p95: Option<Duration>,
    pub p99: Option<Duration>,
    pub p999: Option<Duration>,
}
