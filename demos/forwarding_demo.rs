//! Forwarding Demo
//!
//! Sensor readings arrive on two streams and are forwarded to one stream per
//! zone by `fwd_by_input_value`, keyed on the `zone` member. A custom
//! processor registered by this demo takes each zone stream and logs the
//! running average on its periodic event.
//!
//! Run with: cargo run --bin forwarding_demo

use std::collections::HashMap;
use std::time::Duration;

use config_loader::{ConfigFormat, ConfigLoader};
use contracts::{data_map, CallbackResult, ContractError, Processor, Properties, Route};
use dispatcher::RoutingEngine;

const BLUEPRINT: &str = r#"
[[types]]
name = "Reading"
members = [
    { name = "sensor", kind = "string", key = true },
    { name = "zone", kind = "string" },
    { name = "celsius", kind = "float64" },
]

[[routes]]
name = "zones"
processor = "fwd_by_input_value"

[routes.properties]
input_members = '[{"input": "*_sensors", "member": "zone"}]'
forwarding_table = '[{"input": "north*", "output": "north"}, {"input": "south*", "output": "south"}]'

[[routes.inputs]]
name = "indoor_sensors"
stream_name = "IndoorReadings"
type_name = "Reading"

[[routes.inputs]]
name = "outdoor_sensors"
stream_name = "OutdoorReadings"
type_name = "Reading"

[[routes.outputs]]
name = "north"
stream_name = "NorthZone"
type_name = "Reading"

[[routes.outputs]]
name = "south"
stream_name = "SouthZone"
type_name = "Reading"

[[routes]]
name = "north_average"
processor = "average"
periodic_period_ms = 250

[[routes.inputs]]
name = "readings"
stream_name = "NorthZone"
type_name = "Reading"

[[routes]]
name = "south_average"
processor = "average"
periodic_period_ms = 250

[[routes.inputs]]
name = "readings"
stream_name = "SouthZone"
type_name = "Reading"
"#;

/// Running mean of `celsius` per sensor, logged on every periodic event
#[derive(Default)]
struct Average {
    totals: HashMap<String, (f64, u64)>,
}

impl Processor for Average {
    fn on_data_available(&mut self, route: &dyn Route) -> CallbackResult {
        for sample in &route.require_input("readings")?.take_all()? {
            let (Some(sensor), Some(celsius)) = (
                sample.get("sensor").and_then(|v| v.as_str()),
                sample.get("celsius").and_then(|v| v.as_f64()),
            ) else {
                continue;
            };
            let entry = self.totals.entry(sensor.to_string()).or_default();
            entry.0 += celsius;
            entry.1 += 1;
        }
        Ok(())
    }

    fn on_periodic_event(&mut self, route: &dyn Route) -> CallbackResult {
        for (sensor, (sum, count)) in &self.totals {
            tracing::info!(
                route = %route.name(),
                sensor = %sensor,
                samples = count,
                mean = format!("{:.2}", sum / *count as f64),
                "Zone average"
            );
        }
        Ok(())
    }
}

fn create_average(
    _route: &dyn Route,
    _properties: &Properties,
) -> Result<Box<dyn Processor>, ContractError> {
    Ok(Box::new(Average::default()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting Forwarding Demo");

    let blueprint = ConfigLoader::load_from_str(BLUEPRINT, ConfigFormat::Toml)?;

    let mut plugins = processors::builtin_plugins();
    plugins.register("average", create_average);

    let engine = RoutingEngine::from_blueprint(&blueprint, plugins).await?;
    for failure in engine.activate_all().await {
        tracing::warn!(error = %failure, "Route not activated");
    }

    let sensors = [
        ("IndoorReadings", "lobby", "north_wing"),
        ("IndoorReadings", "lab", "south_wing"),
        ("OutdoorReadings", "roof", "north_roof"),
        ("OutdoorReadings", "yard", "west_yard"),
    ];
    for step in 0..8 {
        for (i, (stream, sensor, zone)) in sensors.iter().enumerate() {
            let celsius = 18.0 + i as f64 + 0.25 * step as f64;
            engine.publish(
                stream,
                data_map! { "sensor" => *sensor, "zone" => *zone, "celsius" => celsius },
            )?;
        }
        engine.flush().await?;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // "west_yard" matches no forwarding entry; those readings are skipped
    for route in engine.routes() {
        let m = route.metrics().snapshot();
        tracing::info!(
            route = %route.name(),
            taken = m.samples_taken,
            written = m.samples_written,
            periodic = m.periodic_events,
            "Route statistics"
        );
    }

    engine.shutdown().await;
    tracing::info!("Forwarding Demo finished");
    Ok(())
}
