//! RoutingBlueprint - Config Loader output
//!
//! Describes a complete routing setup: engine tuning, type schemas, routes
//! with their ports and processor, and observation sinks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{PortInfo, Properties, StructType, TypeRegistry};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Engine-wide settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Type schemas (optional; streams of unregistered types are unchecked)
    #[serde(default)]
    pub types: Vec<StructType>,

    /// Routes
    pub routes: Vec<RouteConfig>,

    /// Observation sinks
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

impl RoutingBlueprint {
    /// Type registry built from the declared schemas
    pub fn type_registry(&self) -> TypeRegistry {
        self.types.iter().cloned().collect()
    }

    pub fn route(&self, name: &str) -> Option<&RouteConfig> {
        self.routes.iter().find(|r| r.name == name)
    }
}

/// Engine-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Input cache depth when a port does not set its own
    #[serde(default = "default_history_depth")]
    pub default_history_depth: usize,

    /// Capacity of each route's event queue
    #[serde(default = "default_route_queue_capacity")]
    pub route_queue_capacity: usize,

    /// What a route does when `on_data_available` or `on_periodic_event` fails
    #[serde(default)]
    pub on_callback_error: CallbackErrorPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_history_depth: default_history_depth(),
            route_queue_capacity: default_route_queue_capacity(),
            on_callback_error: CallbackErrorPolicy::default(),
        }
    }
}

fn default_history_depth() -> usize {
    256
}

fn default_route_queue_capacity() -> usize {
    64
}

/// Reaction to a failed data or periodic callback
///
/// The failure is always recorded as the route's last failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackErrorPolicy {
    /// Keep the route running
    #[default]
    Report,
    /// Disable the route
    Disable,
}

/// One route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Unique route name
    pub name: String,

    /// Registered processor plugin name
    pub processor: String,

    /// Properties handed to the processor factory
    #[serde(default)]
    pub properties: Properties,

    /// Periodic event period (None = no periodic events)
    #[serde(default)]
    pub periodic_period_ms: Option<u64>,

    /// Stay in Started (do not enter Running) after start
    #[serde(default)]
    pub start_paused: bool,

    #[serde(default)]
    pub inputs: Vec<PortConfig>,

    #[serde(default)]
    pub outputs: Vec<PortConfig>,
}

impl RouteConfig {
    /// Input port identities, indexed in declaration order
    pub fn input_infos(&self) -> Vec<PortInfo> {
        Self::port_infos(&self.inputs)
    }

    /// Output port identities, indexed in declaration order
    pub fn output_infos(&self) -> Vec<PortInfo> {
        Self::port_infos(&self.outputs)
    }

    fn port_infos(ports: &[PortConfig]) -> Vec<PortInfo> {
        ports
            .iter()
            .enumerate()
            .map(|(index, p)| {
                PortInfo::new(index, &p.name, p.stream_name.as_str(), &p.type_name)
            })
            .collect()
    }
}

/// One input or output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfig {
    /// Port name, unique within its route and direction
    pub name: String,

    /// Stream (topic) name
    pub stream_name: String,

    /// Registered type name
    pub type_name: String,

    /// Input cache depth override
    #[serde(default)]
    pub history_depth: Option<usize>,
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Glob patterns over stream names (empty = all streams)
    #[serde(default)]
    pub streams: Vec<String>,

    /// Glob patterns over writers as `route/output` (empty = any writer)
    ///
    /// Samples injected from outside the engine have no writer and are
    /// skipped once a pattern is set.
    #[serde(default)]
    pub writers: Vec<String>,

    /// Also observe dispose and unregister events
    #[serde(default = "default_include_lifecycle")]
    pub include_lifecycle: bool,

    /// Queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

fn default_include_lifecycle() -> bool {
    true
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Log,
    /// JSON lines, one file per stream or per writer
    File,
}
