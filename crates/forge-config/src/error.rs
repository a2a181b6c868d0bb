//! Configuration error types.

use crate::validation::ValidationReport;
use std::path::PathBuf;

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Configuration error type.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file could not be parsed.
    #[error("Failed to parse {path}: {message}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// The file extension is not a known format.
    #[error("Unsupported config format for {path} (expected .yaml, .yml, .toml or .json)")]
    UnsupportedFormat {
        /// File path.
        path: PathBuf,
    },

    /// An environment override could not be applied.
    #[error("Invalid environment override {key}: {message}")]
    Env {
        /// Variable name.
        key: String,
        /// What was wrong.
        message: String,
    },

    /// The configuration failed validation.
    #[error("Invalid configuration: {report}")]
    Invalid {
        /// Every issue found.
        report: ValidationReport,
    },
}

impl ConfigError {
    /// Create a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create an environment override error.
    pub fn env(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Env {
            key: key.into(),
            message: message.into(),
        }
    }
}
