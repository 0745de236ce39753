//! Error types for CLI operations.

use std::path::Path;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded or is invalid
    #[error("Failed to load configuration: {message}")]
    ConfigLoad { message: String },

    /// A line of the replay file could not be used
    #[error("Replay file {path}, line {line}: {message}")]
    Replay {
        path: String,
        line: usize,
        message: String,
    },

    /// Engine construction or operation error
    #[error("Routing engine error: {0}")]
    Engine(#[from] dispatcher::DispatchError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn config_not_found(path: &Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn config_load(message: impl Into<String>) -> Self {
        Self::ConfigLoad {
            message: message.into(),
        }
    }

    pub fn replay(path: &Path, line: usize, message: impl Into<String>) -> Self {
        Self::Replay {
            path: path.display().to_string(),
            line,
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

