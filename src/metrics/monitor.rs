use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Number of recent samples kept per operation.
pub const DEFAULT_HISTORY_SIZE: usize = 100;

/// Latency summary for one operation, in milliseconds.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OperationStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
}

impl OperationStats {
    /// Summarize samples using nearest-rank percentiles on a sorted copy.
    pub fn from_samples<'a>(samples: impl IntoIterator<Item = &'a f64>) -> Option<Self> {
        let mut sorted: Vec<f64> = samples.into_iter().copied().collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();

        Some(Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean: sum / count as f64,
            median: nearest_rank(&sorted, 0.5),
            p95: nearest_rank(&sorted, 0.95),
            p99: nearest_rank(&sorted, 0.99),
        })
    }
}

pub(crate) fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

fn nearest_rank(sorted: &[f64], quantile: f64) -> f64 {
    let idx = (sorted.len() as f64 * quantile).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Rolling latency history keyed by operation name.
pub struct PerformanceMonitor {
    metrics: Mutex<HashMap<String, VecDeque<f64>>>,
    history_size: usize,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

impl PerformanceMonitor {
    pub fn new(history_size: usize) -> Self {
        Self {
            metrics: Mutex::new(HashMap::new()),
            history_size: history_size.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<f64>>> {
        self.metrics.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start timing `operation`. The duration is recorded when the returned
    /// timer is finished or dropped, so early returns are still measured.
    pub fn start(&self, operation: impl Into<String>) -> Timer<'_> {
        Timer {
            monitor: self,
            operation: operation.into(),
            started: Instant::now(),
            recorded: false,
        }
    }

    pub fn record(&self, operation: &str, duration: Duration) {
        let millis = as_millis_f64(duration);
        let mut metrics = self.lock();
        let samples = metrics
            .entry(operation.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.history_size));

        samples.push_back(millis);
        while samples.len() > self.history_size {
            samples.pop_front();
        }
    }

    pub fn stats(&self, operation: &str) -> Option<OperationStats> {
        let metrics = self.lock();
        metrics
            .get(operation)
            .and_then(|samples| OperationStats::from_samples(samples))
    }

    pub fn all_stats(&self) -> BTreeMap<String, OperationStats> {
        let metrics = self.lock();
        metrics
            .iter()
            .filter_map(|(op, samples)| {
                OperationStats::from_samples(samples).map(|stats| (op.clone(), stats))
            })
            .collect()
    }

    pub fn reset(&self) {
        self.lock().clear();
    }
}

/// Scoped measurement of a single operation.
pub struct Timer<'a> {
    monitor: &'a PerformanceMonitor,
    operation: String,
    started: Instant,
    recorded: bool,
}

impl Timer<'_> {
    /// Record now and return the measured duration.
    pub fn finish(mut self) -> Duration {
        let elapsed = self.started.elapsed();
        self.monitor.record(&self.operation, elapsed);
        self.recorded = true;
        elapsed
    }
}

impl Drop for Timer<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            self.monitor.record(&self.operation, self.started.elapsed());
        }
    }
}
