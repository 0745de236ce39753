//! `run` command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use contracts::RoutingBlueprint;
use tracing::{info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::session::{load_replay, Session, SessionConfig};

/// Execute the `run` command
pub async fn run_engine(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let blueprint = load_blueprint(&args.config)?;

    info!(
        routes = blueprint.routes.len(),
        types = blueprint.types.len(),
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let replay = match &args.replay {
        Some(path) => {
            let events = load_replay(path)?;
            info!(path = %path.display(), events = events.len(), "Replay loaded");
            events
        }
        None => Vec::new(),
    };

    let session = Session::new(SessionConfig {
        blueprint,
        replay,
        duration: (args.duration_secs > 0).then(|| Duration::from_secs(args.duration_secs)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    info!("Starting routes...");

    let stats = session
        .run(shutdown_signal())
        .await
        .context("Session failed")?;

    info!(
        duration_secs = stats.duration.as_secs_f64(),
        samples_written = stats.samples_written(),
        "Session completed"
    );
    stats.print_summary();

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never resolves; the session then
/// ends on its own terms.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &RoutingBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Engine:");
    println!(
        "  History depth: {}",
        blueprint.engine.default_history_depth
    );
    println!(
        "  Route queue capacity: {}",
        blueprint.engine.route_queue_capacity
    );

    println!("\nRoutes ({}):", blueprint.routes.len());
    for route in &blueprint.routes {
        println!(
            "  - {} ({}) - {} inputs, {} outputs",
            route.name,
            route.processor,
            route.inputs.len(),
            route.outputs.len()
        );
    }

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
