//! Layered error definitions
//!
//! Categorized by source: config / selector / port / processor / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Missing or invalid processor property
    #[error("invalid property '{key}': {message}")]
    ConfigProperty { key: String, message: String },

    // ===== Port Errors =====
    /// Port lookup failed
    #[error("{kind} port not found: {name}")]
    PortNotFound { kind: PortKind, name: String },

    /// Port exists but is not enabled
    #[error("{kind} port '{name}' is not enabled")]
    PortDisabled { kind: PortKind, name: String },

    /// Malformed selector (e.g. filter expression that does not parse)
    #[error("invalid selector: {message}")]
    InvalidSelector { message: String },

    /// Output write rejected
    #[error("write to '{output}' failed: {message}")]
    Write { output: String, message: String },

    // ===== Processor Errors =====
    /// Processor callback failure
    #[error("processor error: {message}")]
    Processor {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Direction of a route port, used in error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Input,
    Output,
}

impl std::fmt::Display for PortKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortKind::Input => f.write_str("input"),
            PortKind::Output => f.write_str("output"),
        }
    }
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create property error
    pub fn config_property(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigProperty {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create input-not-found error
    pub fn input_not_found(name: impl Into<String>) -> Self {
        Self::PortNotFound {
            kind: PortKind::Input,
            name: name.into(),
        }
    }

    /// Create output-not-found error
    pub fn output_not_found(name: impl Into<String>) -> Self {
        Self::PortNotFound {
            kind: PortKind::Output,
            name: name.into(),
        }
    }

    /// Create selector error
    pub fn invalid_selector(message: impl Into<String>) -> Self {
        Self::InvalidSelector {
            message: message.into(),
        }
    }

    /// Create output write error
    pub fn write(output: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            output: output.into(),
            message: message.into(),
        }
    }

    /// Create processor error from a message
    pub fn processor(message: impl Into<String>) -> Self {
        Self::Processor {
            message: message.into(),
            source: None,
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
