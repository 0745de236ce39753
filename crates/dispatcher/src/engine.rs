//! Routing engine
//!
//! Owns the stream bus, the observation sinks and one worker per route.
//! Samples enter either from route outputs or through [`RoutingEngine::publish`].

use std::sync::Arc;
use std::time::Duration;

use contracts::{
    DataMap, EngineConfig, InstanceState, OutputSample, RouteConfig, RoutingBlueprint, StreamName,
    TypeRegistry,
};
use observability::{CallbackStatsAggregator, MetricsSummary};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::error::{CallbackFailure, DispatchError};
use crate::fanout::SinkFanout;
use crate::metrics::{MetricsSnapshot, RouteMetrics};
use crate::plugin::PluginRegistry;
use crate::route::RouteCore;
use crate::stream::{DataSignal, StreamBus};
use crate::worker::{spawn_route, RouteHandle};

pub struct RoutingEngine {
    config: EngineConfig,
    plugins: PluginRegistry,
    bus: Arc<StreamBus>,
    routes: Vec<RouteHandle>,
    workers: Vec<JoinHandle<()>>,
}

impl RoutingEngine {
    pub fn new(
        config: EngineConfig,
        types: TypeRegistry,
        sinks: SinkFanout,
        plugins: PluginRegistry,
    ) -> Self {
        Self {
            config,
            plugins,
            bus: Arc::new(StreamBus::new(types, sinks)),
            routes: Vec::new(),
            workers: Vec::new(),
        }
    }

    /// Build the sinks and every route of `blueprint`; routes start disabled
    #[instrument(name = "engine_from_blueprint", skip_all, fields(routes = blueprint.routes.len()))]
    pub async fn from_blueprint(
        blueprint: &RoutingBlueprint,
        plugins: PluginRegistry,
    ) -> Result<Self, DispatchError> {
        let sinks = SinkFanout::from_configs(&blueprint.sinks).await?;
        Self::with_sinks(blueprint, plugins, sinks)
    }

    /// Like [`from_blueprint`](Self::from_blueprint) with an already running
    /// sink set; `blueprint.sinks` is ignored
    pub fn with_sinks(
        blueprint: &RoutingBlueprint,
        plugins: PluginRegistry,
        sinks: SinkFanout,
    ) -> Result<Self, DispatchError> {
        let mut engine = Self::new(
            blueprint.engine.clone(),
            blueprint.type_registry(),
            sinks,
            plugins,
        );
        for route in &blueprint.routes {
            engine.add_route(route)?;
        }
        info!(routes = engine.routes.len(), "Routing engine ready");
        Ok(engine)
    }

    /// Add a disabled route and spawn its worker
    ///
    /// # Errors
    /// `UnknownProcessor` when no plugin is registered under
    /// `config.processor`, `DuplicateRoute` when the name is taken.
    pub fn add_route(&mut self, config: &RouteConfig) -> Result<&RouteHandle, DispatchError> {
        if self.routes.iter().any(|r| r.name() == config.name) {
            return Err(DispatchError::DuplicateRoute(config.name.clone()));
        }
        let factory = self.plugins.get(&config.processor).ok_or_else(|| {
            DispatchError::UnknownProcessor {
                route: config.name.clone(),
                plugin: config.processor.clone(),
            }
        })?;

        for port in config.inputs.iter().chain(&config.outputs) {
            self.bus
                .declare(&StreamName::from(port.stream_name.as_str()), &port.type_name)?;
        }

        let signal = Arc::new(DataSignal::default());
        let metrics = Arc::new(RouteMetrics::new());
        let core = RouteCore::new(
            config,
            factory,
            &self.config,
            &self.bus,
            Arc::clone(&signal),
            Arc::clone(&metrics),
        );
        let (handle, worker) = spawn_route(
            core,
            signal,
            metrics,
            config.periodic_period_ms.map(Duration::from_millis),
            self.config.route_queue_capacity,
        );
        self.routes.push(handle);
        self.workers.push(worker);

        let index = self.routes.len() - 1;
        Ok(&self.routes[index])
    }

    pub fn route(&self, name: &str) -> Result<&RouteHandle, DispatchError> {
        self.routes
            .iter()
            .find(|r| r.name() == name)
            .ok_or_else(|| DispatchError::RouteNotFound(name.to_string()))
    }

    /// Routes in the order they were added
    pub fn routes(&self) -> impl Iterator<Item = &RouteHandle> {
        self.routes.iter()
    }

    pub fn bus(&self) -> &Arc<StreamBus> {
        &self.bus
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Enable and start every disabled route
    ///
    /// Returns the failures; a route that fails stays where its failing
    /// step left it and the others still proceed.
    pub async fn activate_all(&self) -> Vec<DispatchError> {
        let mut failures = Vec::new();
        for route in &self.routes {
            if route.state().is_some() {
                continue;
            }
            let result = match route.enable().await {
                Ok(_) => route.start().await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!(route = %route.name(), error = %e, "Route not activated");
                failures.push(e);
            }
        }
        failures
    }

    /// Flush every route in the order they were added
    ///
    /// A route chain declared upstream first settles in one call.
    pub async fn flush(&self) -> Result<(), DispatchError> {
        for route in &self.routes {
            route.flush().await?;
        }
        Ok(())
    }

    /// Inject a sample on `stream` from outside the engine
    pub fn publish(
        &self,
        stream: &str,
        sample: impl Into<OutputSample>,
    ) -> Result<u64, DispatchError> {
        Ok(self.bus.publish(&StreamName::from(stream), None, sample.into())?)
    }

    /// Dispose the instance of `stream` identified by the key members in `key`
    pub fn dispose(&self, stream: &str, key: &DataMap) -> Result<u64, DispatchError> {
        Ok(self.bus.publish_lifecycle(
            &StreamName::from(stream),
            None,
            key,
            InstanceState::NotAliveDisposed,
        )?)
    }

    /// Mark the instance of `stream` identified by `key` as having no writers
    pub fn unregister(&self, stream: &str, key: &DataMap) -> Result<u64, DispatchError> {
        Ok(self.bus.publish_lifecycle(
            &StreamName::from(stream),
            None,
            key,
            InstanceState::NotAliveNoWriters,
        )?)
    }

    /// Last data or periodic callback failure of every route that had one
    pub fn callback_failures(&self) -> Vec<CallbackFailure> {
        self.routes.iter().filter_map(RouteHandle::last_failure).collect()
    }

    /// Callback latency across all routes
    pub fn callback_summary(&self) -> MetricsSummary {
        let mut merged = CallbackStatsAggregator::new();
        for route in &self.routes {
            merged.merge(&route.metrics().callback_stats());
        }
        merged.summary()
    }

    pub fn sink_metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.bus.sink_metrics()
    }

    /// Disable every route (last added first), stop the workers and drain the sinks
    #[instrument(name = "engine_shutdown", skip(self))]
    pub async fn shutdown(self) {
        for route in self.routes.iter().rev() {
            if route.state().is_none() {
                continue;
            }
            if let Err(e) = route.disable().await {
                warn!(route = %route.name(), error = %e, "Route disable failed during shutdown");
            }
        }

        // closing the command channels ends the workers
        drop(self.routes);
        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "Route worker panicked");
            }
        }

        self.bus.shutdown_sinks().await;
        info!("Routing engine shut down");
    }
}
