//! Routing metrics
//!
//! Thin wrappers over the `metrics` macros, plus an in-memory aggregator for
//! callback latency used in run summaries.

use std::collections::HashMap;

use contracts::{Callback, RouteState};
use metrics::{counter, gauge, histogram};

/// Record a route state change
pub fn record_route_transition(route: &str, from: Option<RouteState>, to: Option<RouteState>) {
    let from = from.map(RouteState::as_str).unwrap_or("disabled");
    let to = to.map(RouteState::as_str).unwrap_or("disabled");
    counter!(
        "routing_proc_route_transitions_total",
        "route" => route.to_string(),
        "from" => from,
        "to" => to
    )
    .increment(1);
}

/// Record one processor callback and how long it took
pub fn record_callback(route: &str, callback: Callback, success: bool, duration_ms: f64) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "routing_proc_callbacks_total",
        "route" => route.to_string(),
        "callback" => callback.as_str(),
        "status" => status
    )
    .increment(1);

    histogram!(
        "routing_proc_callback_duration_ms",
        "callback" => callback.as_str()
    )
    .record(duration_ms);
}

/// Record samples handed out by read
pub fn record_samples_read(route: &str, input: &str, count: usize) {
    counter!(
        "routing_proc_samples_read_total",
        "route" => route.to_string(),
        "input" => input.to_string()
    )
    .increment(count as u64);
}

/// Record samples removed by take
pub fn record_samples_taken(route: &str, input: &str, count: usize) {
    counter!(
        "routing_proc_samples_taken_total",
        "route" => route.to_string(),
        "input" => input.to_string()
    )
    .increment(count as u64);
}

/// Record one sample published on a stream
pub fn record_sample_published(stream: &str, valid_data: bool) {
    let kind = if valid_data { "data" } else { "lifecycle" };
    counter!(
        "routing_proc_samples_published_total",
        "stream" => stream.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// Record samples evicted from an input cache by its history depth
pub fn record_samples_evicted(route: &str, input: &str, count: u64) {
    counter!(
        "routing_proc_samples_evicted_total",
        "route" => route.to_string(),
        "input" => input.to_string()
    )
    .increment(count);
}

/// Record the number of samples cached by an input
pub fn record_cache_depth(route: &str, input: &str, depth: usize) {
    gauge!(
        "routing_proc_cache_depth",
        "route" => route.to_string(),
        "input" => input.to_string()
    )
    .set(depth as f64);
}

/// Record a stream record handed to a sink
pub fn record_record_dispatched(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "routing_proc_records_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Callback latency aggregator
///
/// Kept in memory so a run can print a summary without a metrics backend.
#[derive(Debug, Clone, Default)]
pub struct CallbackStatsAggregator {
    pub total_calls: u64,
    pub total_failures: u64,
    pub per_callback: HashMap<&'static str, RunningStats>,
    pub failures: HashMap<&'static str, u64>,
}

impl CallbackStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, callback: Callback, success: bool, duration_ms: f64) {
        self.total_calls += 1;
        self.per_callback
            .entry(callback.as_str())
            .or_default()
            .push(duration_ms);
        if !success {
            self.total_failures += 1;
            *self.failures.entry(callback.as_str()).or_insert(0) += 1;
        }
    }

    /// Merge another aggregator's statistics into this one
    pub fn merge(&mut self, other: &CallbackStatsAggregator) {
        self.total_calls += other.total_calls;
        self.total_failures += other.total_failures;
        for (name, stats) in &other.per_callback {
            self.per_callback.entry(*name).or_default().merge(stats);
        }
        for (name, count) in &other.failures {
            *self.failures.entry(*name).or_insert(0) += count;
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let mut callbacks: Vec<_> = self
            .per_callback
            .iter()
            .map(|(name, stats)| CallbackSummary {
                callback: *name,
                failures: self.failures.get(name).copied().unwrap_or(0),
                latency_ms: StatsSummary::from(stats),
            })
            .collect();
        callbacks.sort_by(|a, b| a.callback.cmp(b.callback));

        MetricsSummary {
            total_calls: self.total_calls,
            total_failures: self.total_failures,
            failure_rate: if self.total_calls > 0 {
                self.total_failures as f64 / self.total_calls as f64 * 100.0
            } else {
                0.0
            },
            callbacks,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Per-callback line of a [`MetricsSummary`]
#[derive(Debug, Clone, Default)]
pub struct CallbackSummary {
    pub callback: &'static str,
    pub failures: u64,
    pub latency_ms: StatsSummary,
}

/// Callback metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_calls: u64,
    pub total_failures: u64,
    pub failure_rate: f64,
    pub callbacks: Vec<CallbackSummary>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Callback Summary ===")?;
        writeln!(f, "Total callbacks: {}", self.total_calls)?;
        writeln!(
            f,
            "Failed callbacks: {} ({:.2}%)",
            self.total_failures, self.failure_rate
        )?;
        for line in &self.callbacks {
            writeln!(
                f,
                "  {}: {} (failures={})",
                line.callback, line.latency_ms, line.failures
            )?;
        }
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// Combine with another set of observations (Chan et al.)
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let mean = self.mean + delta * other.count as f64 / count as f64;
        self.m2 += other.m2 + delta * delta * (self.count * other.count) as f64 / count as f64;
        self.mean = mean;
        self.count = count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
