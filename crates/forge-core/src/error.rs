//! Error taxonomy for remote agent invocation.
//!
//! Two layers:
//! - [`TransportError`]: what a single attempt against one endpoint can fail with
//! - [`ProxyError`]: what a caller of `run(task)` ever sees

use crate::attempt::{AttemptOutcome, AttemptRecord};
use std::time::Duration;
use thiserror::Error;

/// Result type for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Failure of a single transport attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No response before the timeout elapsed
    #[error("Request to {endpoint} timed out after {timeout_ms}ms")]
    Timeout {
        /// Endpoint URL
        endpoint: String,
        /// Timeout that elapsed, in milliseconds
        timeout_ms: u64,
    },

    /// Connection could not be established or was lost
    #[error("Connection error for {endpoint}: {message}")]
    Connection {
        /// Endpoint URL
        endpoint: String,
        /// Error message
        message: String,
    },

    /// Well-formed error response from the remote agent
    #[error("Remote error from {endpoint} ({code}): {message}")]
    Remote {
        /// Endpoint URL
        endpoint: String,
        /// Error code from the response body, or the HTTP status
        code: String,
        /// Error message from the response body
        message: String,
        /// HTTP status code, if the error came with one
        status: Option<u16>,
    },

    /// Credential missing or rejected
    #[error("Authentication failed for {endpoint}: {message}")]
    Auth {
        /// Endpoint URL
        endpoint: String,
        /// Error message
        message: String,
    },
}

impl TransportError {
    /// Create a timeout error
    pub fn timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            endpoint: endpoint.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Create a connection error
    pub fn connection(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a remote error
    pub fn remote(
        endpoint: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        status: Option<u16>,
    ) -> Self {
        Self::Remote {
            endpoint: endpoint.into(),
            code: code.into(),
            message: message.into(),
            status,
        }
    }

    /// Create an authentication error
    pub fn auth(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Auth {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Endpoint the error occurred on
    #[must_use]
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Timeout { endpoint, .. }
            | Self::Connection { endpoint, .. }
            | Self::Remote { endpoint, .. }
            | Self::Auth { endpoint, .. } => endpoint,
        }
    }

    /// Whether failing over to another endpoint may help.
    ///
    /// Credentials are not endpoint-specific, so `Auth` never fails over.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Auth { .. })
    }

    /// HTTP status code if available
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => *status,
            Self::Auth { .. } => Some(401),
            _ => None,
        }
    }

    /// Convert into the outcome stored on an attempt record
    #[must_use]
    pub fn outcome(&self) -> AttemptOutcome {
        match self {
            Self::Timeout { .. } => AttemptOutcome::Timeout,
            Self::Connection { message, .. } => AttemptOutcome::ConnectionError {
                message: message.clone(),
            },
            Self::Remote { code, message, .. } => AttemptOutcome::ServerError {
                code: code.clone(),
                message: message.clone(),
            },
            Self::Auth { message, .. } => AttemptOutcome::AuthError {
                message: message.clone(),
            },
        }
    }
}

/// Error surfaced to callers of a remote agent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// Credential missing or rejected; never failed over
    #[error("Authentication failed for {endpoint}: {message}")]
    Auth {
        /// Endpoint that rejected the credential
        endpoint: String,
        /// Error message
        message: String,
    },

    /// Every permitted attempt failed
    #[error("All {} attempt(s) failed: {}", attempts.len(), summarize(attempts))]
    Exhausted {
        /// Every attempt made, in order
        attempts: Vec<AttemptRecord>,
    },

    /// Invalid proxy configuration
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// The caller cancelled the call
    #[error("Call cancelled after {} attempt(s)", attempts.len())]
    Cancelled {
        /// Attempts completed before cancellation
        attempts: Vec<AttemptRecord>,
    },
}

impl ProxyError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Auth {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create an exhausted error
    #[must_use]
    pub fn exhausted(attempts: Vec<AttemptRecord>) -> Self {
        Self::Exhausted { attempts }
    }

    /// Attempts recorded for this error, if any
    #[must_use]
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            Self::Exhausted { attempts } | Self::Cancelled { attempts } => attempts,
            _ => &[],
        }
    }

    /// Stable error code for logs and JSON output
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth_error",
            Self::Exhausted { .. } => "exhausted",
            Self::Configuration { .. } => "configuration_error",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

fn summarize(attempts: &[AttemptRecord]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
