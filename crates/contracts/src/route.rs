//! Route - the owner of a Processor and its ports

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ContractError, Input, Output};

/// Route lifecycle state
///
/// `Created -> Started -> Running <-> Paused -> Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteState {
    #[default]
    Created,
    Started,
    Running,
    Paused,
    Stopped,
}

impl RouteState {
    /// States in which data and periodic callbacks are dispatched
    pub fn is_running(self) -> bool {
        self == RouteState::Running
    }

    /// Started, Running or Paused
    pub fn is_active(self) -> bool {
        matches!(
            self,
            RouteState::Started | RouteState::Running | RouteState::Paused
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RouteState::Created => "created",
            RouteState::Started => "started",
            RouteState::Running => "running",
            RouteState::Paused => "paused",
            RouteState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for RouteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// View of a Route handed to every Processor callback
///
/// Iteration (`inputs()` / `outputs()`) only yields ports while the route is
/// started; it is empty while a port is being disabled and from `on_stop`
/// onwards. Lookup by name or index keeps working for every enabled port,
/// including one that is about to be disabled.
pub trait Route {
    fn name(&self) -> &str;

    fn state(&self) -> RouteState;

    /// Enabled inputs in index order
    fn inputs(&self) -> Box<dyn Iterator<Item = &dyn Input> + '_>;

    /// Enabled outputs in index order
    fn outputs(&self) -> Box<dyn Iterator<Item = &dyn Output> + '_>;

    fn input(&self, name: &str) -> Option<&dyn Input>;

    fn input_at(&self, index: usize) -> Option<&dyn Input>;

    fn output(&self, name: &str) -> Option<&dyn Output>;

    fn output_at(&self, index: usize) -> Option<&dyn Output>;

    /// Lookup that fails with `PortNotFound`
    fn require_input(&self, name: &str) -> Result<&dyn Input, ContractError> {
        self.input(name)
            .ok_or_else(|| ContractError::input_not_found(name))
    }

    /// Lookup that fails with `PortNotFound`
    fn require_output(&self, name: &str) -> Result<&dyn Output, ContractError> {
        self.output(name)
            .ok_or_else(|| ContractError::output_not_found(name))
    }
}
