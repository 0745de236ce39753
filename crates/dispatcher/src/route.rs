//! Route state machine
//!
//! [`RouteCore`] owns a route's ports and, while the route is enabled, its
//! Processor. Every lifecycle operation and data event goes through here, on
//! the route's worker task, so callbacks of one route never overlap.
//!
//! A lifecycle callback error rejects the event: the state is left as it was
//! and the port changes made for the event are undone. A data or periodic
//! callback error is kept as the route's last failure and handled according
//! to the engine's [`CallbackErrorPolicy`].

use std::sync::Arc;
use std::time::Instant;

use contracts::{
    Callback, CallbackErrorPolicy, CallbackResult, EngineConfig, Input, Output, Processor,
    ProcessorFactory, Properties, Route, RouteConfig, RouteState,
};
use tracing::{debug, info, warn};

use crate::error::{CallbackFailure, DispatchError};
use crate::metrics::RouteMetrics;
use crate::port::{InputPort, OutputPort};
use crate::stream::{DataSignal, StreamBus};

/// The route as a Processor sees it
///
/// Only enabled ports can be looked up. Iteration yields nothing unless the
/// route is between a successful `on_start` and the next `on_stop`; during
/// `on_stop` itself it is already empty.
pub(crate) struct RoutePorts {
    name: String,
    state: RouteState,
    iterable: bool,
    inputs: Vec<InputPort>,
    outputs: Vec<OutputPort>,
}

impl Route for RoutePorts {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> RouteState {
        self.state
    }

    fn inputs(&self) -> Box<dyn Iterator<Item = &dyn Input> + '_> {
        if !self.iterable {
            return Box::new(std::iter::empty());
        }
        Box::new(
            self.inputs
                .iter()
                .filter(|p| p.is_enabled())
                .map(|p| p as &dyn Input),
        )
    }

    fn outputs(&self) -> Box<dyn Iterator<Item = &dyn Output> + '_> {
        if !self.iterable {
            return Box::new(std::iter::empty());
        }
        Box::new(
            self.outputs
                .iter()
                .filter(|p| p.is_enabled())
                .map(|p| p as &dyn Output),
        )
    }

    fn input(&self, name: &str) -> Option<&dyn Input> {
        self.inputs
            .iter()
            .find(|p| p.is_enabled() && Input::name(*p) == name)
            .map(|p| p as &dyn Input)
    }

    fn input_at(&self, index: usize) -> Option<&dyn Input> {
        self.inputs
            .get(index)
            .filter(|p| p.is_enabled())
            .map(|p| p as &dyn Input)
    }

    fn output(&self, name: &str) -> Option<&dyn Output> {
        self.outputs
            .iter()
            .find(|p| p.is_enabled() && Output::name(*p) == name)
            .map(|p| p as &dyn Output)
    }

    fn output_at(&self, index: usize) -> Option<&dyn Output> {
        self.outputs
            .get(index)
            .filter(|p| p.is_enabled())
            .map(|p| p as &dyn Output)
    }
}

pub(crate) struct RouteCore {
    ports: RoutePorts,
    processor: Option<Box<dyn Processor>>,
    factory: Arc<dyn ProcessorFactory>,
    properties: Properties,
    start_paused: bool,
    on_callback_error: CallbackErrorPolicy,
    last_failure: Option<CallbackFailure>,
    signal: Arc<DataSignal>,
    metrics: Arc<RouteMetrics>,
}

impl RouteCore {
    pub(crate) fn new(
        config: &RouteConfig,
        factory: Arc<dyn ProcessorFactory>,
        engine: &EngineConfig,
        bus: &Arc<StreamBus>,
        signal: Arc<DataSignal>,
        metrics: Arc<RouteMetrics>,
    ) -> Self {
        let inputs = config
            .input_infos()
            .into_iter()
            .zip(&config.inputs)
            .map(|(info, port)| {
                InputPort::new(
                    &config.name,
                    info,
                    port.history_depth.unwrap_or(engine.default_history_depth),
                    Arc::clone(bus),
                    Arc::clone(&metrics),
                )
            })
            .collect();
        let outputs = config
            .output_infos()
            .into_iter()
            .map(|info| {
                OutputPort::new(&config.name, info, Arc::clone(bus), Arc::clone(&metrics))
            })
            .collect();

        Self {
            ports: RoutePorts {
                name: config.name.clone(),
                state: RouteState::Created,
                iterable: false,
                inputs,
                outputs,
            },
            processor: None,
            factory,
            properties: config.properties.clone(),
            start_paused: config.start_paused,
            on_callback_error: engine.on_callback_error,
            last_failure: None,
            signal,
            metrics,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.ports.name
    }

    /// Current state, `None` while disabled
    pub(crate) fn status(&self) -> Option<RouteState> {
        self.processor.as_ref().map(|_| self.ports.state)
    }

    pub(crate) fn last_failure(&self) -> Option<&CallbackFailure> {
        self.last_failure.as_ref()
    }

    /// Create the Processor and enable every port
    ///
    /// On failure the ports already enabled are disabled again (their
    /// `on_*_disabled` callbacks still run) and the Processor is dropped.
    pub(crate) fn enable(&mut self) -> Result<RouteState, DispatchError> {
        if let Some(state) = self.status() {
            return Err(DispatchError::invalid_transition(self.name(), "enable", state));
        }
        self.ports.state = RouteState::Created;
        self.ports.iterable = false;

        let started = Instant::now();
        let created = self.factory.create_processor(&self.ports, &self.properties);
        self.record(Callback::Create, created.is_ok(), started);
        let processor = created.map_err(|source| {
            warn!(route = %self.name(), error = %source, "Processor creation failed");
            DispatchError::callback_failed(self.name(), Callback::Create, source)
        })?;
        self.processor = Some(processor);

        for index in 0..self.ports.inputs.len() {
            if let Err(e) = self.ports.inputs[index].enable(&self.signal) {
                self.rollback_enable();
                return Err(e.into());
            }
            let result = self.invoke(Callback::InputEnabled, |p, r| {
                p.on_input_enabled(r, &r.inputs[index])
            });
            if let Err(e) = result {
                self.ports.inputs[index].disable();
                self.rollback_enable();
                return Err(e);
            }
        }

        for index in 0..self.ports.outputs.len() {
            self.ports.outputs[index].set_enabled(true);
            let result = self.invoke(Callback::OutputEnabled, |p, r| {
                p.on_output_enabled(r, &r.outputs[index])
            });
            if let Err(e) = result {
                self.ports.outputs[index].set_enabled(false);
                self.rollback_enable();
                return Err(e);
            }
        }

        self.transition(None, RouteState::Created);
        Ok(RouteState::Created)
    }

    fn rollback_enable(&mut self) {
        for index in (0..self.ports.outputs.len()).rev() {
            if self.ports.outputs[index].is_enabled() {
                let _ = self.invoke(Callback::OutputDisabled, |p, r| {
                    p.on_output_disabled(r, &r.outputs[index])
                });
                self.ports.outputs[index].set_enabled(false);
            }
        }
        for index in (0..self.ports.inputs.len()).rev() {
            if self.ports.inputs[index].is_enabled() {
                let _ = self.invoke(Callback::InputDisabled, |p, r| {
                    p.on_input_disabled(r, &r.inputs[index])
                });
                self.ports.inputs[index].disable();
            }
        }
        self.processor = None;
    }

    pub(crate) fn start(&mut self) -> Result<RouteState, DispatchError> {
        self.expect("start", &[RouteState::Created, RouteState::Stopped])?;

        self.ports.iterable = true;
        if let Err(e) = self.invoke(Callback::Start, |p, r| p.on_start(r)) {
            self.ports.iterable = false;
            return Err(e);
        }
        self.transition(Some(self.ports.state), RouteState::Started);

        if self.start_paused {
            return Ok(RouteState::Started);
        }
        self.run()
    }

    /// Enter Running from Started or Paused
    pub(crate) fn resume(&mut self) -> Result<RouteState, DispatchError> {
        self.expect("resume", &[RouteState::Started, RouteState::Paused])?;
        self.run()
    }

    fn run(&mut self) -> Result<RouteState, DispatchError> {
        self.invoke(Callback::Run, |p, r| p.on_run(r))?;
        self.transition(Some(self.ports.state), RouteState::Running);

        // data that arrived while not running
        if self.ports.inputs.iter().any(InputPort::has_unread) {
            self.signal.take();
            let delivered = self.deliver(Callback::DataAvailable, |p, r| p.on_data_available(r));
            if let Err(e) = delivered {
                if self.status().is_none() {
                    return Err(e);
                }
            }
        }
        Ok(RouteState::Running)
    }

    pub(crate) fn pause(&mut self) -> Result<RouteState, DispatchError> {
        self.expect("pause", &[RouteState::Running])?;
        self.invoke(Callback::Pause, |p, r| p.on_pause(r))?;
        self.transition(Some(RouteState::Running), RouteState::Paused);
        Ok(RouteState::Paused)
    }

    pub(crate) fn stop(&mut self) -> Result<RouteState, DispatchError> {
        self.expect(
            "stop",
            &[RouteState::Started, RouteState::Running, RouteState::Paused],
        )?;
        self.ports.iterable = false;
        if let Err(e) = self.invoke(Callback::Stop, |p, r| p.on_stop(r)) {
            self.ports.iterable = true;
            return Err(e);
        }
        self.transition(Some(self.ports.state), RouteState::Stopped);
        Ok(RouteState::Stopped)
    }

    /// Stop if needed, disable every port and drop the Processor
    ///
    /// A failing `on_*_disabled` leaves that port (and the ones after it)
    /// enabled and the route enabled.
    pub(crate) fn disable(&mut self) -> Result<(), DispatchError> {
        let Some(state) = self.status() else {
            return Err(DispatchError::invalid_transition(
                self.name(),
                "disable",
                "disabled",
            ));
        };
        if state.is_active() {
            self.stop()?;
        }

        for index in 0..self.ports.inputs.len() {
            if self.ports.inputs[index].is_enabled() {
                self.invoke(Callback::InputDisabled, |p, r| {
                    p.on_input_disabled(r, &r.inputs[index])
                })?;
                self.ports.inputs[index].disable();
            }
        }
        for index in 0..self.ports.outputs.len() {
            if self.ports.outputs[index].is_enabled() {
                self.invoke(Callback::OutputDisabled, |p, r| {
                    p.on_output_disabled(r, &r.outputs[index])
                })?;
                self.ports.outputs[index].set_enabled(false);
            }
        }

        self.processor = None;
        let from = self.ports.state;
        self.ports.state = RouteState::Created;
        observability::record_route_transition(self.name(), Some(from), None);
        info!(route = %self.name(), "Route disabled");
        Ok(())
    }

    /// Deliver a data-available event if the route is running
    pub(crate) fn dispatch_data_available(&mut self) {
        if self.status() != Some(RouteState::Running) {
            debug!(route = %self.name(), "Data held until the route runs");
            return;
        }
        // recorded in last_failure
        let _ = self.deliver(Callback::DataAvailable, |p, r| p.on_data_available(r));
    }

    pub(crate) fn dispatch_periodic(&mut self) {
        if self.status() != Some(RouteState::Running) {
            return;
        }
        let _ = self.deliver(Callback::PeriodicEvent, |p, r| p.on_periodic_event(r));
    }

    /// Invoke a data or periodic callback and apply the error policy
    fn deliver<F>(&mut self, callback: Callback, f: F) -> Result<(), DispatchError>
    where
        F: FnOnce(&mut dyn Processor, &RoutePorts) -> CallbackResult,
    {
        let Err(e) = self.invoke(callback, f) else {
            return Ok(());
        };
        let message = match &e {
            DispatchError::CallbackFailed { source, .. } => source.to_string(),
            other => other.to_string(),
        };
        let count = self.last_failure.as_ref().map_or(0, |last| last.count) + 1;
        self.last_failure = Some(CallbackFailure {
            route: self.ports.name.clone(),
            callback,
            message,
            count,
        });

        if self.on_callback_error == CallbackErrorPolicy::Disable {
            warn!(
                route = %self.ports.name,
                callback = %callback,
                "Disabling route after callback failure"
            );
            if let Err(disable_err) = self.disable() {
                warn!(route = %self.ports.name, error = %disable_err, "Route disable failed");
            }
        }
        Err(e)
    }

    fn expect(&self, operation: &'static str, allowed: &[RouteState]) -> Result<(), DispatchError> {
        match self.status() {
            Some(state) if allowed.contains(&state) => Ok(()),
            Some(state) => Err(DispatchError::invalid_transition(self.name(), operation, state)),
            None => Err(DispatchError::invalid_transition(
                self.name(),
                operation,
                "disabled",
            )),
        }
    }

    fn invoke<F>(&mut self, callback: Callback, f: F) -> Result<(), DispatchError>
    where
        F: FnOnce(&mut dyn Processor, &RoutePorts) -> CallbackResult,
    {
        let Some(processor) = self.processor.as_deref_mut() else {
            return Err(DispatchError::invalid_transition(
                &self.ports.name,
                callback.as_str(),
                "disabled",
            ));
        };

        let started = Instant::now();
        let result = f(processor, &self.ports);
        self.record(callback, result.is_ok(), started);

        result.map_err(|source| {
            warn!(
                route = %self.ports.name,
                callback = %callback,
                error = %source,
                "Callback failed"
            );
            DispatchError::callback_failed(&self.ports.name, callback, source)
        })
    }

    fn record(&self, callback: Callback, success: bool, started: Instant) {
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.record_callback(callback, success, duration_ms);
        observability::record_callback(&self.ports.name, callback, success, duration_ms);
    }

    fn transition(&mut self, from: Option<RouteState>, to: RouteState) {
        self.ports.state = to;
        observability::record_route_transition(&self.ports.name, from, Some(to));
        info!(route = %self.ports.name, state = %to, "Route state changed");
    }
}
