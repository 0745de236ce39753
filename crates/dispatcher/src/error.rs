//! Dispatcher error types

use contracts::{Callback, ContractError};
use thiserror::Error;

/// Errors returned by engine and route operations
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A processor callback (or the factory) returned an error
    ///
    /// The triggering event was rejected; the route keeps its previous state.
    #[error("route '{route}': {callback} failed: {source}")]
    CallbackFailed {
        route: String,
        callback: Callback,
        #[source]
        source: ContractError,
    },

    /// Operation not allowed in the route's current state
    #[error("route '{route}': cannot {operation} while {state}")]
    InvalidTransition {
        route: String,
        operation: &'static str,
        state: String,
    },

    #[error("route not found: {0}")]
    RouteNotFound(String),

    #[error("route '{0}' already exists")]
    DuplicateRoute(String),

    /// No processor plugin registered under this name
    #[error("route '{route}': unknown processor plugin '{plugin}'")]
    UnknownProcessor { route: String, plugin: String },

    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Route worker is gone (engine shut down)
    #[error("route '{0}' worker is not running")]
    WorkerClosed(String),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Last data or periodic callback failure of a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackFailure {
    pub route: String,
    pub callback: Callback,
    pub message: String,
    /// Failures of this route so far, this one included
    pub count: u64,
}

impl std::fmt::Display for CallbackFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "route '{}': {} failed ({} so far): {}",
            self.route, self.callback, self.count, self.message
        )
    }
}

impl DispatchError {
    pub fn callback_failed(
        route: impl Into<String>,
        callback: Callback,
        source: ContractError,
    ) -> Self {
        Self::CallbackFailed {
            route: route.into(),
            callback,
            source,
        }
    }

    pub fn invalid_transition(
        route: impl Into<String>,
        operation: &'static str,
        state: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidTransition {
            route: route.into(),
            operation,
            state: state.to_string(),
        }
    }

    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Callback that failed, if this is a callback failure
    pub fn callback(&self) -> Option<Callback> {
        match self {
            Self::CallbackFailed { callback, .. } => Some(*callback),
            _ => None,
        }
    }
}
