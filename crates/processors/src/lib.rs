//! # Processors
//!
//! Ready-made Processor plugins:
//! - `shapes`: joins Square and Circle samples into Triangle
//! - `fwd_by_input_name` / `fwd_by_input_value`: table-driven forwarding

pub mod forwarding;
pub mod shapes;
pub mod table;

pub use forwarding::ForwardingEngine;
pub use shapes::ShapesProcessor;
pub use table::MatchingTable;

use dispatcher::PluginRegistry;

/// Registry holding every plugin of this crate
pub fn builtin_plugins() -> PluginRegistry {
    let mut plugins = PluginRegistry::new();
    plugins
        .register(shapes::PLUGIN_NAME, shapes::create_processor)
        .register(forwarding::BY_INPUT_NAME, forwarding::create_by_input_name)
        .register(forwarding::BY_INPUT_VALUE, forwarding::create_by_input_value);
    plugins
}

#[cfg(test)]
pub(crate) mod testing {
    use contracts::{EngineConfig, PortConfig, Properties, RouteConfig, TypeRegistry};
    use dispatcher::{MemorySink, RecordFilter, RecordLog, RoutingEngine, SinkFanout, SinkHandle};

    fn port(name: &str, stream: &str) -> PortConfig {
        PortConfig {
            name: name.into(),
            stream_name: stream.into(),
            type_name: "ShapeType".into(),
            history_depth: None,
        }
    }

    /// Route config from `(port, stream)` pairs
    pub(crate) fn route(
        name: &str,
        processor: &str,
        properties: &[(&str, &str)],
        inputs: &[(&str, &str)],
        outputs: &[(&str, &str)],
    ) -> RouteConfig {
        RouteConfig {
            name: name.into(),
            processor: processor.into(),
            properties: properties
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Properties>(),
            periodic_period_ms: None,
            start_paused: false,
            inputs: inputs.iter().map(|(n, s)| port(n, s)).collect(),
            outputs: outputs.iter().map(|(n, s)| port(n, s)).collect(),
        }
    }

    /// Running engine with every route activated and a capture sink on all streams
    pub(crate) async fn start(routes: Vec<RouteConfig>) -> (RoutingEngine, RecordLog) {
        let (sink, log) = MemorySink::new("capture");
        let mut sinks = SinkFanout::default();
        sinks.push(SinkHandle::spawn(sink, RecordFilter::all(), 1024));

        let mut engine = RoutingEngine::new(
            EngineConfig::default(),
            TypeRegistry::new(),
            sinks,
            super::builtin_plugins(),
        );
        for route in &routes {
            engine.add_route(route).unwrap();
        }
        let failures = engine.activate_all().await;
        assert!(failures.is_empty(), "{failures:?}");
        (engine, log)
    }
}
