//! Shapes Demo
//!
//! Runs the shapes join processor: squares moving across the screen pick up
//! the size of the circle with the same color and come out as triangles.
//! Every Triangle sample is logged by a log sink.
//!
//! Run with: cargo run --bin shapes_demo [blueprint.toml]

use std::collections::HashMap;
use std::time::Duration;

use config_loader::ConfigLoader;
use contracts::{
    data_map, ConfigVersion, EngineConfig, MemberDescriptor, PortConfig, Properties, RouteConfig,
    RoutingBlueprint, SinkConfig, SinkType, StructType, TypeKind,
};
use dispatcher::RoutingEngine;
use processors::shapes;

const COLORS: [&str; 3] = ["BLUE", "RED", "GREEN"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting Shapes Demo");

    // ==== Stage 1: Use default blueprint or load from file ====
    let blueprint = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading blueprint config");
        ConfigLoader::load_from_path(std::path::Path::new(&path))?
    } else {
        create_shapes_blueprint()
    };

    // ==== Stage 2: Build and activate the routes ====
    let engine = RoutingEngine::from_blueprint(&blueprint, processors::builtin_plugins()).await?;
    for failure in engine.activate_all().await {
        tracing::warn!(error = %failure, "Route not activated");
    }

    // ==== Stage 3: Publish circles once, then move the squares ====
    for (i, color) in COLORS.iter().enumerate() {
        let size = 20 + 10 * i as i32;
        engine.publish("Circle", data_map! { "color" => *color, "x" => 0, "y" => size })?;
    }

    for step in 0..10 {
        for (i, color) in COLORS.iter().enumerate() {
            let x = step * 15;
            let y = 40 * i as i32 + step;
            engine.publish("Square", data_map! { "color" => *color, "x" => x, "y" => y })?;
        }
        engine.flush().await?;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // The red square leaves the screen
    engine.dispose("Square", &data_map! { "color" => "RED" })?;
    engine.flush().await?;

    // ==== Stage 4: Report and shut down ====
    for route in engine.routes() {
        let m = route.metrics().snapshot();
        tracing::info!(
            route = %route.name(),
            read = m.samples_read,
            taken = m.samples_taken,
            written = m.samples_written,
            "Route statistics"
        );
    }
    println!("{}", engine.callback_summary());

    engine.shutdown().await;
    tracing::info!("Shapes Demo finished");
    Ok(())
}

fn create_shapes_blueprint() -> RoutingBlueprint {
    let member = |name: &str, kind, key| MemberDescriptor {
        name: name.to_string(),
        kind,
        key,
    };
    let port = |name: &str| PortConfig {
        name: name.to_string(),
        stream_name: name.to_string(),
        type_name: "ShapeType".to_string(),
        history_depth: Some(16),
    };

    RoutingBlueprint {
        version: ConfigVersion::V1,
        engine: EngineConfig::default(),
        types: vec![StructType {
            name: "ShapeType".to_string(),
            members: vec![
                member("color", TypeKind::String, true),
                member("x", TypeKind::Int32, false),
                member("y", TypeKind::Int32, false),
                member("shapesize", TypeKind::Int32, false),
            ],
        }],
        routes: vec![RouteConfig {
            name: "shapes".to_string(),
            processor: shapes::PLUGIN_NAME.to_string(),
            properties: Properties::new(),
            periodic_period_ms: None,
            start_paused: false,
            inputs: vec![port(shapes::SQUARE), port(shapes::CIRCLE)],
            outputs: vec![port(shapes::TRIANGLE)],
        }],
        sinks: vec![SinkConfig {
            name: "triangles".to_string(),
            sink_type: SinkType::Log,
            streams: vec![shapes::TRIANGLE.to_string()],
            writers: vec![],
            include_lifecycle: true,
            queue_capacity: 100,
            params: HashMap::new(),
        }],
    }
}
