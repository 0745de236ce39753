//! Selector - which cached samples a read/take returns
//!
//! Instance selection uses one encoding only: an [`InstanceHandle`] value
//! (`{ "valid": bool, "value": [16 bytes] }` when serialized).

use serde::{Deserialize, Serialize};

use crate::{InstanceHandle, InstanceState, SampleState, StateMask, ViewState};

/// Content filter evaluated by the engine
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentFilter {
    /// Predicate over sample members, e.g. `x > 10 AND color = %0`
    pub expression: String,
    /// Values bound to `%0`, `%1`, ...
    #[serde(default)]
    pub parameters: Vec<String>,
}

/// Sample selection criteria; `Selector::default()` selects everything
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Selector {
    pub sample_state: StateMask,
    pub view_state: StateMask,
    pub instance_state: StateMask,
    pub max_samples: Option<usize>,
    /// Only samples of this instance
    pub instance: Option<InstanceHandle>,
    /// Only samples of the lowest instance greater than this handle
    pub next_instance: Option<InstanceHandle>,
    pub filter: Option<ContentFilter>,
}

impl Selector {
    /// Select all available samples
    pub fn all() -> Self {
        Self::default()
    }

    /// Samples of a single instance
    pub fn instance(handle: InstanceHandle) -> Self {
        Self {
            instance: Some(handle),
            ..Self::default()
        }
    }

    /// Samples of the instance that follows `handle`
    pub fn next_instance(handle: InstanceHandle) -> Self {
        Self {
            next_instance: Some(handle),
            ..Self::default()
        }
    }

    pub fn with_max_samples(mut self, max: usize) -> Self {
        self.max_samples = Some(max);
        self
    }

    pub fn with_sample_state(mut self, state: SampleState) -> Self {
        self.sample_state = state.into();
        self
    }

    pub fn with_view_state(mut self, state: ViewState) -> Self {
        self.view_state = state.into();
        self
    }

    pub fn with_instance_state(mut self, state: InstanceState) -> Self {
        self.instance_state = state.into();
        self
    }

    pub fn with_filter(mut self, expression: impl Into<String>, parameters: Vec<String>) -> Self {
        self.filter = Some(ContentFilter {
            expression: expression.into(),
            parameters,
        });
        self
    }
}
