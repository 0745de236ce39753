//! Shared test fixtures

use std::sync::Arc;
use std::time::Duration;

use contracts::{
    Callback, CallbackResult, ConfigVersion, ContractError, EngineConfig, MemberDescriptor,
    PortConfig, Processor, ProcessorFactory, Properties, Route, RouteConfig, RoutingBlueprint,
    StructType, TypeKind,
};
use dispatcher::{
    MemorySink, PluginRegistry, RecordFilter, RecordLog, RoutingEngine, SinkFanout, SinkHandle,
};

pub const SHAPE_TYPE: &str = "ShapeType";

/// `color` is the key
pub fn shape_type() -> StructType {
    let member = |name: &str, kind, key| MemberDescriptor {
        name: name.into(),
        kind,
        key,
    };
    StructType {
        name: SHAPE_TYPE.into(),
        members: vec![
            member("color", TypeKind::String, true),
            member("x", TypeKind::Int32, false),
            member("y", TypeKind::Int32, false),
            member("shapesize", TypeKind::Int32, false),
        ],
    }
}

pub fn port(name: &str, stream: &str) -> PortConfig {
    PortConfig {
        name: name.into(),
        stream_name: stream.into(),
        type_name: SHAPE_TYPE.into(),
        history_depth: None,
    }
}

pub fn route(
    name: &str,
    processor: &str,
    inputs: Vec<PortConfig>,
    outputs: Vec<PortConfig>,
) -> RouteConfig {
    RouteConfig {
        name: name.into(),
        processor: processor.into(),
        properties: Properties::new(),
        periodic_period_ms: None,
        start_paused: false,
        inputs,
        outputs,
    }
}

pub fn blueprint(routes: Vec<RouteConfig>) -> RoutingBlueprint {
    RoutingBlueprint {
        version: ConfigVersion::V1,
        engine: EngineConfig::default(),
        types: vec![shape_type()],
        routes,
        sinks: Vec::new(),
    }
}

/// Engine over `blueprint` with a capture sink on every stream; routes disabled
pub fn build(blueprint: &RoutingBlueprint, plugins: PluginRegistry) -> (RoutingEngine, RecordLog) {
    let (sink, log) = MemorySink::new("capture");
    let mut sinks = SinkFanout::default();
    sinks.push(SinkHandle::spawn(sink, RecordFilter::all(), 1024));
    let engine = RoutingEngine::with_sinks(blueprint, plugins, sinks).unwrap();
    (engine, log)
}

/// Poll `condition` every few milliseconds for up to two seconds
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

pub type DataHook = Arc<dyn Fn(&dyn Route) -> CallbackResult + Send + Sync>;

/// Processor running a test-supplied closure on data available
///
/// `fail_on` makes one lifecycle callback return an error.
pub struct Scripted {
    on_data: DataHook,
    fail_on: Option<Callback>,
}

impl Scripted {
    fn check(&self, callback: Callback) -> CallbackResult {
        if self.fail_on == Some(callback) {
            return Err(ContractError::processor(format!("{callback} fails on request")));
        }
        Ok(())
    }
}

impl Processor for Scripted {
    fn on_start(&mut self, _route: &dyn Route) -> CallbackResult {
        self.check(Callback::Start)
    }

    fn on_stop(&mut self, _route: &dyn Route) -> CallbackResult {
        self.check(Callback::Stop)
    }

    fn on_run(&mut self, _route: &dyn Route) -> CallbackResult {
        self.check(Callback::Run)
    }

    fn on_pause(&mut self, _route: &dyn Route) -> CallbackResult {
        self.check(Callback::Pause)
    }

    fn on_data_available(&mut self, route: &dyn Route) -> CallbackResult {
        self.check(Callback::DataAvailable)?;
        (self.on_data)(route)
    }
}

pub struct ScriptedFactory {
    pub on_data: DataHook,
    pub fail_on: Option<Callback>,
}

impl ScriptedFactory {
    pub fn new(on_data: impl Fn(&dyn Route) -> CallbackResult + Send + Sync + 'static) -> Self {
        Self {
            on_data: Arc::new(on_data),
            fail_on: None,
        }
    }

    pub fn failing_on(mut self, callback: Callback) -> Self {
        self.fail_on = Some(callback);
        self
    }
}

impl ProcessorFactory for ScriptedFactory {
    fn create_processor(
        &self,
        _route: &dyn Route,
        _properties: &Properties,
    ) -> Result<Box<dyn Processor>, ContractError> {
        Ok(Box::new(Scripted {
            on_data: Arc::clone(&self.on_data),
            fail_on: self.fail_on,
        }))
    }
}

/// Registry with the built-in processors plus `scripted`
pub fn plugins_with(scripted: ScriptedFactory) -> PluginRegistry {
    let mut plugins = processors::builtin_plugins();
    plugins.register("scripted", scripted);
    plugins
}
