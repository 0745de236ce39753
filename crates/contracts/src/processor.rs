//! Processor - user logic driven by Route events
//!
//! A Processor receives event notifications from its owning Route as method
//! calls. Each event is tied to a Route state, which constrains what the
//! callback may do (see [`Route`] for port visibility).
//!
//! Returning `Err` from any callback is allowed: the Route rejects the event
//! and none of its post-conditions apply, including the state transition.
//! The event may be delivered again or never; side effects a callback
//! performs before failing must tolerate either.
//!
//! # Thread safety
//!
//! Calls on one Processor are serialized by its Route. Processors of
//! different Routes may be called concurrently from different threads, hence
//! the `Send` bound.

use std::collections::HashMap;
use std::fmt;

use crate::{ContractError, Input, Output, Route};

/// Configuration properties given to a Processor at construction
pub type Properties = HashMap<String, String>;

/// Result of every Processor callback
pub type CallbackResult = Result<(), ContractError>;

/// Route event handler
///
/// Only [`on_data_available`](Processor::on_data_available) must be
/// implemented; every other callback defaults to a no-op.
pub trait Processor: Send {
    /// Called right after `input` has been enabled
    fn on_input_enabled(&mut self, _route: &dyn Route, _input: &dyn Input) -> CallbackResult {
        Ok(())
    }

    /// Called right before `input` is disabled
    fn on_input_disabled(&mut self, _route: &dyn Route, _input: &dyn Input) -> CallbackResult {
        Ok(())
    }

    /// Called right after `output` has been enabled
    fn on_output_enabled(&mut self, _route: &dyn Route, _output: &dyn Output) -> CallbackResult {
        Ok(())
    }

    /// Called right before `output` is disabled
    fn on_output_disabled(&mut self, _route: &dyn Route, _output: &dyn Output) -> CallbackResult {
        Ok(())
    }

    /// Called right before the Route enters Started; all ports are enabled
    fn on_start(&mut self, _route: &dyn Route) -> CallbackResult {
        Ok(())
    }

    /// Called right before the Route enters Stopped
    ///
    /// Ports are still enabled and can be looked up, but iteration is
    /// already empty.
    fn on_stop(&mut self, _route: &dyn Route) -> CallbackResult {
        Ok(())
    }

    /// Called right before the Route enters Running
    ///
    /// Follows a successful `on_start`, or a manual resume after a pause.
    fn on_run(&mut self, _route: &dyn Route) -> CallbackResult {
        Ok(())
    }

    /// Called right before the Route enters Paused
    fn on_pause(&mut self, _route: &dyn Route) -> CallbackResult {
        Ok(())
    }

    /// New data on any input; only while Running
    ///
    /// Any input may be read/taken and any output written.
    fn on_data_available(&mut self, route: &dyn Route) -> CallbackResult;

    /// Periodic timer; only while Running
    fn on_periodic_event(&mut self, _route: &dyn Route) -> CallbackResult {
        Ok(())
    }
}

/// Creates the Processor of a Route when the Route is enabled
///
/// A factory that cannot build a Processor from `properties` returns an
/// error; the Route is then not enabled.
pub trait ProcessorFactory: Send + Sync {
    fn create_processor(
        &self,
        route: &dyn Route,
        properties: &Properties,
    ) -> Result<Box<dyn Processor>, ContractError>;
}

impl<F> ProcessorFactory for F
where
    F: Fn(&dyn Route, &Properties) -> Result<Box<dyn Processor>, ContractError> + Send + Sync,
{
    fn create_processor(
        &self,
        route: &dyn Route,
        properties: &Properties,
    ) -> Result<Box<dyn Processor>, ContractError> {
        self(route, properties)
    }
}

/// Names of the dispatched events, for errors, logs and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Callback {
    Create,
    InputEnabled,
    InputDisabled,
    OutputEnabled,
    OutputDisabled,
    Start,
    Stop,
    Run,
    Pause,
    DataAvailable,
    PeriodicEvent,
}

impl Callback {
    pub fn as_str(self) -> &'static str {
        match self {
            Callback::Create => "create_processor",
            Callback::InputEnabled => "on_input_enabled",
            Callback::InputDisabled => "on_input_disabled",
            Callback::OutputEnabled => "on_output_enabled",
            Callback::OutputDisabled => "on_output_disabled",
            Callback::Start => "on_start",
            Callback::Stop => "on_stop",
            Callback::Run => "on_run",
            Callback::Pause => "on_pause",
            Callback::DataAvailable => "on_data_available",
            Callback::PeriodicEvent => "on_periodic_event",
        }
    }
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
