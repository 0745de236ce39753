//! `info` command implementation.

use std::collections::HashMap;

use anyhow::{Context, Result};
use contracts::{PortConfig, RoutingBlueprint};
use serde::Serialize;
use tracing::info;

use super::load_blueprint;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    engine: EngineInfo,
    types: Vec<TypeInfo>,
    routes: Vec<RouteInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct EngineInfo {
    default_history_depth: usize,
    route_queue_capacity: usize,
}

#[derive(Serialize)]
struct TypeInfo {
    name: String,
    members: usize,
    keys: Vec<String>,
}

#[derive(Serialize)]
struct RouteInfo {
    name: String,
    processor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    periodic_period_ms: Option<u64>,
    start_paused: bool,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    properties: HashMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    inputs: Vec<PortInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    outputs: Vec<PortInfo>,
}

#[derive(Serialize)]
struct PortInfo {
    index: usize,
    name: String,
    stream_name: String,
    type_name: String,
    history_depth: usize,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    streams: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    writers: Vec<String>,
    include_lifecycle: bool,
    queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = load_blueprint(&args.config)?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn port_infos(ports: &[PortConfig], default_depth: usize) -> Vec<PortInfo> {
    ports
        .iter()
        .enumerate()
        .map(|(index, p)| PortInfo {
            index,
            name: p.name.clone(),
            stream_name: p.stream_name.clone(),
            type_name: p.type_name.clone(),
            history_depth: p.history_depth.unwrap_or(default_depth),
        })
        .collect()
}

fn build_config_info(blueprint: &RoutingBlueprint, args: &InfoArgs) -> ConfigInfo {
    let depth = blueprint.engine.default_history_depth;

    let routes = blueprint
        .routes
        .iter()
        .map(|r| {
            let (inputs, outputs) = if args.ports {
                (port_infos(&r.inputs, depth), port_infos(&r.outputs, depth))
            } else {
                (Vec::new(), Vec::new())
            };
            RouteInfo {
                name: r.name.clone(),
                processor: r.processor.clone(),
                periodic_period_ms: r.periodic_period_ms,
                start_paused: r.start_paused,
                properties: r.properties.clone(),
                inputs,
                outputs,
            }
        })
        .collect();

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                streams: s.streams.clone(),
                writers: s.writers.clone(),
                include_lifecycle: s.include_lifecycle,
                queue_capacity: s.queue_capacity,
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        engine: EngineInfo {
            default_history_depth: depth,
            route_queue_capacity: blueprint.engine.route_queue_capacity,
        },
        types: blueprint
            .types
            .iter()
            .map(|t| TypeInfo {
                name: t.name.clone(),
                members: t.members.len(),
                keys: t
                    .members
                    .iter()
                    .filter(|m| m.key)
                    .map(|m| m.name.clone())
                    .collect(),
            })
            .collect(),
        routes,
        sinks,
    }
}

fn tree_prefix(index: usize, len: usize) -> (&'static str, &'static str) {
    if index + 1 == len {
        ("└─", "   ")
    } else {
        ("├─", "│  ")
    }
}

fn print_ports(label: &str, ports: &[PortConfig], default_depth: usize, child_prefix: &str) {
    if ports.is_empty() {
        return;
    }
    println!("   {}  {} ({}):", child_prefix, label, ports.len());
    for (j, port) in ports.iter().enumerate() {
        let (prefix, _) = tree_prefix(j, ports.len());
        println!(
            "   {}     {} [{}] {} <{}> {} (depth {})",
            child_prefix,
            prefix,
            j,
            port.name,
            port.type_name,
            port.stream_name,
            port.history_depth.unwrap_or(default_depth)
        );
    }
}

fn print_config_info(blueprint: &RoutingBlueprint, args: &InfoArgs) {
    let depth = blueprint.engine.default_history_depth;

    println!("=== Routing Configuration ===\n");

    println!("Engine");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Default history depth: {}", depth);
    println!(
        "   └─ Route queue capacity: {}",
        blueprint.engine.route_queue_capacity
    );

    if !blueprint.types.is_empty() {
        println!("\nTypes ({})", blueprint.types.len());
        for (i, ty) in blueprint.types.iter().enumerate() {
            let (prefix, _) = tree_prefix(i, blueprint.types.len());
            let keys: Vec<&str> = ty
                .members
                .iter()
                .filter(|m| m.key)
                .map(|m| m.name.as_str())
                .collect();
            println!(
                "   {} {} - {} members, key {:?}",
                prefix,
                ty.name,
                ty.members.len(),
                keys
            );
        }
    }

    println!("\nRoutes ({})", blueprint.routes.len());
    for (i, route) in blueprint.routes.iter().enumerate() {
        let (prefix, child_prefix) = tree_prefix(i, blueprint.routes.len());
        let periodic = route
            .periodic_period_ms
            .map_or_else(|| "no periodic events".to_string(), |ms| format!("every {ms} ms"));
        println!(
            "   {} {} ({}, {})",
            prefix, route.name, route.processor, periodic
        );

        if args.ports {
            print_ports("Inputs", &route.inputs, depth, child_prefix);
            print_ports("Outputs", &route.outputs, depth, child_prefix);
        } else {
            println!(
                "   {}  └─ {} inputs, {} outputs",
                child_prefix,
                route.inputs.len(),
                route.outputs.len()
            );
        }
    }

    if args.sinks && !blueprint.sinks.is_empty() {
        println!("\nSinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let (prefix, _) = tree_prefix(i, blueprint.sinks.len());
            let mut selection = if sink.streams.is_empty() {
                "all streams".to_string()
            } else {
                sink.streams.join(", ")
            };
            if !sink.writers.is_empty() {
                selection.push_str(&format!(" from {}", sink.writers.join(", ")));
            }
            if !sink.include_lifecycle {
                selection.push_str(", data only");
            }
            println!("   {} {} ({:?}) - {}", prefix, sink.name, sink.sink_type, selection);
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::{ConfigFormat, ConfigLoader};

    const CONFIG: &str = r#"
[engine]
default_history_depth = 16

[[routes]]
name = "shapes"
processor = "shapes"

[[routes.inputs]]
name = "Square"
stream_name = "Square"
type_name = "ShapeType"
history_depth = 4

[[routes.inputs]]
name = "Circle"
stream_name = "Circle"
type_name = "ShapeType"

[[sinks]]
name = "log"
sink_type = "log"
writers = ["shapes/*"]
"#;

    fn args(ports: bool, sinks: bool) -> InfoArgs {
        InfoArgs {
            config: "unused.toml".into(),
            json: true,
            ports,
            sinks,
        }
    }

    #[test]
    fn test_ports_resolve_default_depth() {
        let bp = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        let info = build_config_info(&bp, &args(true, false));

        let inputs = &info.routes[0].inputs;
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].history_depth, 4);
        assert_eq!(inputs[1].history_depth, 16);
        assert_eq!(inputs[1].index, 1);
        assert!(info.sinks.is_empty());
    }

    #[test]
    fn test_ports_hidden_without_flag() {
        let bp = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        let info = build_config_info(&bp, &args(false, true));

        assert!(info.routes[0].inputs.is_empty());
        assert_eq!(info.sinks.len(), 1);
        let json = serde_json::to_value(&info).unwrap();
        assert!(json["routes"][0].get("inputs").is_none());
        assert_eq!(json["sinks"][0]["writers"][0], "shapes/*");
        assert_eq!(json["sinks"][0]["include_lifecycle"], true);
        assert!(json["sinks"][0].get("streams").is_none());
    }
}
