//! Session statistics.

use std::time::Duration;

use contracts::RouteState;
use dispatcher::{MetricsSnapshot, RouteMetricsSnapshot};
use observability::MetricsSummary;

/// Final view of one route
#[derive(Debug, Clone)]
pub struct RouteStats {
    pub name: String,
    /// `None` when the route never got enabled
    pub state: Option<RouteState>,
    pub metrics: RouteMetricsSnapshot,
}

/// Statistics from a session run
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub duration: Duration,

    /// Routes that could not be enabled or started
    pub activation_failures: usize,

    /// Replay events injected successfully
    pub replay_published: u64,

    /// Replay events rejected by the stream bus
    pub replay_rejected: u64,

    pub routes: Vec<RouteStats>,

    pub sinks: Vec<(String, MetricsSnapshot)>,

    pub callbacks: MetricsSummary,
}

impl SessionStats {
    /// Samples written by route outputs
    pub fn samples_written(&self) -> u64 {
        self.routes.iter().map(|r| r.metrics.samples_written).sum()
    }

    pub fn running_routes(&self) -> usize {
        self.routes
            .iter()
            .filter(|r| r.state.is_some_and(RouteState::is_running))
            .count()
    }

    pub fn print_summary(&self) {
        println!("\n=== Session Statistics ===\n");
        println!("Overview");
        println!("   Duration: {:.2}s", self.duration.as_secs_f64());
        println!(
            "   Routes: {} ({} running, {} failed to activate)",
            self.routes.len(),
            self.running_routes(),
            self.activation_failures
        );
        println!(
            "   Replay: {} published, {} rejected",
            self.replay_published, self.replay_rejected
        );
        println!("   Samples written by routes: {}", self.samples_written());

        if !self.routes.is_empty() {
            println!("\nRoutes");
            for route in &self.routes {
                let state = route
                    .state
                    .map_or_else(|| "disabled".to_string(), |s| s.to_string());
                let m = &route.metrics;
                println!(
                    "   {} [{}]: read={} taken={} written={} evicted={} callbacks={} failed={}",
                    route.name,
                    state,
                    m.samples_read,
                    m.samples_taken,
                    m.samples_written,
                    m.samples_evicted,
                    m.callbacks,
                    m.callback_failures
                );
            }
        }

        if !self.sinks.is_empty() {
            println!("\nSinks");
            for (name, m) in &self.sinks {
                println!(
                    "   {}: written={} failed={} dropped={}",
                    name, m.write_count, m.failure_count, m.dropped_count
                );
            }
        }

        println!("\n{}", self.callbacks);
    }
}
