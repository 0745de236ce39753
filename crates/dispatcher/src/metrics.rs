//! Sink and route metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use contracts::Callback;
use observability::{CallbackStatsAggregator, MetricsSummary};
use serde::Serialize;

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    queue_len: AtomicUsize,
    write_count: AtomicU64,
    failure_count: AtomicU64,
    /// Records dropped because the queue was full
    dropped_count: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    pub fn inc_write_count(&self) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            write_count: self.write_count(),
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub write_count: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
}

/// Metrics for a single route
///
/// Shared between the route worker (writer) and its handle (reader).
#[derive(Debug, Default)]
pub struct RouteMetrics {
    callbacks: AtomicU64,
    callback_failures: AtomicU64,
    data_available: AtomicU64,
    periodic_events: AtomicU64,
    samples_read: AtomicU64,
    samples_taken: AtomicU64,
    samples_written: AtomicU64,
    samples_evicted: AtomicU64,
    /// Batches handed out and not yet dropped
    outstanding_loans: AtomicUsize,
    latency: Mutex<CallbackStatsAggregator>,
}

impl RouteMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_callback(&self, callback: Callback, success: bool, duration_ms: f64) {
        self.callbacks.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.callback_failures.fetch_add(1, Ordering::Relaxed);
        }
        match callback {
            Callback::DataAvailable => {
                self.data_available.fetch_add(1, Ordering::Relaxed);
            }
            Callback::PeriodicEvent => {
                self.periodic_events.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
        if let Ok(mut latency) = self.latency.lock() {
            latency.update(callback, success, duration_ms);
        }
    }

    pub(crate) fn add_read(&self, count: usize) {
        self.samples_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn add_taken(&self, count: usize) {
        self.samples_taken.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn inc_written(&self) {
        self.samples_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_evicted(&self, count: u64) {
        self.samples_evicted.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn loan_out(&self) {
        self.outstanding_loans.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn loan_returned(&self) {
        self.outstanding_loans.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn outstanding_loans(&self) -> usize {
        self.outstanding_loans.load(Ordering::Relaxed)
    }

    /// Per-callback latency summary
    pub fn callback_summary(&self) -> MetricsSummary {
        self.latency
            .lock()
            .map(|latency| latency.summary())
            .unwrap_or_default()
    }

    /// Copy of the latency aggregator, for merging across routes
    pub fn callback_stats(&self) -> CallbackStatsAggregator {
        self.latency
            .lock()
            .map(|latency| latency.clone())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> RouteMetricsSnapshot {
        RouteMetricsSnapshot {
            callbacks: self.callbacks.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
            data_available: self.data_available.load(Ordering::Relaxed),
            periodic_events: self.periodic_events.load(Ordering::Relaxed),
            samples_read: self.samples_read.load(Ordering::Relaxed),
            samples_taken: self.samples_taken.load(Ordering::Relaxed),
            samples_written: self.samples_written.load(Ordering::Relaxed),
            samples_evicted: self.samples_evicted.load(Ordering::Relaxed),
            outstanding_loans: self.outstanding_loans(),
        }
    }
}

/// Snapshot of route metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouteMetricsSnapshot {
    pub callbacks: u64,
    pub callback_failures: u64,
    pub data_available: u64,
    pub periodic_events: u64,
    pub samples_read: u64,
    pub samples_taken: u64,
    pub samples_written: u64,
    pub samples_evicted: u64,
    pub outstanding_loans: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_metrics_snapshot() {
        let metrics = RouteMetrics::new();
        metrics.record_callback(Callback::DataAvailable, true, 0.5);
        metrics.record_callback(Callback::PeriodicEvent, false, 0.1);
        metrics.add_read(3);
        metrics.add_taken(2);
        metrics.loan_out();

        let snap = metrics.snapshot();
        assert_eq!(snap.callbacks, 2);
        assert_eq!(snap.callback_failures, 1);
        assert_eq!(snap.data_available, 1);
        assert_eq!(snap.periodic_events, 1);
        assert_eq!(snap.samples_read, 3);
        assert_eq!(snap.outstanding_loans, 1);

        metrics.loan_returned();
        assert_eq!(metrics.outstanding_loans(), 0);
        assert_eq!(metrics.callback_summary().total_calls, 2);
    }
}
