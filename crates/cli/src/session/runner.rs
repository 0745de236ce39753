//! Session runner - drives a routing engine from activation to shutdown.

use std::future::Future;
use std::time::{Duration, Instant};

use contracts::RoutingBlueprint;
use dispatcher::RoutingEngine;
use tracing::{debug, info, warn};

use super::replay::{ReplayAction, ReplayEvent};
use super::stats::{RouteStats, SessionStats};
use crate::error::Result;

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub blueprint: RoutingBlueprint,

    /// Events injected once every route is activated
    pub replay: Vec<ReplayEvent>,

    /// Run time limit (None = until shutdown, or until the replay ends if there is one)
    pub duration: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

pub struct Session {
    config: SessionConfig,
}

#[derive(Default)]
struct ReplayOutcome {
    published: u64,
    rejected: u64,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Run until the duration elapses, the replay ends or `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<SessionStats> {
        let start_time = Instant::now();

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let engine =
            RoutingEngine::from_blueprint(&self.config.blueprint, processors::builtin_plugins())
                .await?;

        let failures = engine.activate_all().await;
        info!(
            routes = engine.routes().count(),
            failed = failures.len(),
            "Routes activated"
        );

        let mut outcome = ReplayOutcome::default();
        let has_replay = !self.config.replay.is_empty();
        let duration = self.config.duration;

        let drive = async {
            if has_replay {
                replay_events(&engine, &self.config.replay, &mut outcome).await;
                info!(
                    published = outcome.published,
                    rejected = outcome.rejected,
                    "Replay finished"
                );
            }
            match duration {
                Some(limit) => {
                    let remaining = limit.saturating_sub(start_time.elapsed());
                    tokio::time::sleep(remaining).await;
                    info!(duration_secs = limit.as_secs(), "Run duration reached");
                }
                None if has_replay => {}
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = drive => {}
            _ = shutdown => {
                warn!("Received shutdown signal, stopping routes...");
            }
        }

        if let Err(e) = engine.flush().await {
            warn!(error = %e, "Final flush failed");
        }

        let stats = SessionStats {
            duration: start_time.elapsed(),
            activation_failures: failures.len(),
            replay_published: outcome.published,
            replay_rejected: outcome.rejected,
            routes: engine
                .routes()
                .map(|route| RouteStats {
                    name: route.name().to_string(),
                    state: route.state(),
                    metrics: route.metrics().snapshot(),
                })
                .collect(),
            sinks: engine.sink_metrics(),
            callbacks: engine.callback_summary(),
        };

        info!("Shutting down routing engine...");
        engine.shutdown().await;

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            samples_written = stats.samples_written(),
            "Session complete"
        );
        Ok(stats)
    }
}

/// Inject `events` in order, settling every route after each one
async fn replay_events(engine: &RoutingEngine, events: &[ReplayEvent], outcome: &mut ReplayOutcome) {
    for event in events {
        if !event.delay.is_zero() {
            tokio::time::sleep(event.delay).await;
        }

        let result = match &event.action {
            ReplayAction::Publish(data) => engine.publish(&event.stream, data.clone()),
            ReplayAction::Dispose(key) => engine.dispose(&event.stream, key),
            ReplayAction::Unregister(key) => engine.unregister(&event.stream, key),
        };
        match result {
            Ok(sequence) => {
                outcome.published += 1;
                debug!(stream = %event.stream, sequence, "Replay event published");
            }
            Err(e) => {
                outcome.rejected += 1;
                warn!(stream = %event.stream, error = %e, "Replay event rejected");
            }
        }

        if let Err(e) = engine.flush().await {
            warn!(error = %e, "Flush after replay event failed");
        }
    }
}
