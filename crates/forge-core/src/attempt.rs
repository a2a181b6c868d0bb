//! Attempt records kept for diagnosis and health decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Outcome of a single remote call attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The remote agent returned an output
    Success,
    /// No response before the timeout elapsed
    Timeout,
    /// The connection could not be established or was lost
    ConnectionError {
        /// Transport-level description
        message: String,
    },
    /// The remote agent returned a structured error
    ServerError {
        /// Error code reported by the remote side
        code: String,
        /// Error message reported by the remote side
        message: String,
    },
    /// The remote side rejected the credential
    AuthError {
        /// Rejection reason
        message: String,
    },
}

impl AttemptOutcome {
    /// Check if the attempt succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Short label used for metrics and logs
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Timeout => "timeout",
            Self::ConnectionError { .. } => "connection_error",
            Self::ServerError { .. } => "server_error",
            Self::AuthError { .. } => "auth_error",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Timeout => write!(f, "timeout"),
            Self::ConnectionError { message } => write!(f, "connection error: {message}"),
            Self::ServerError { code, message } => write!(f, "server error ({code}): {message}"),
            Self::AuthError { message } => write!(f, "auth error: {message}"),
        }
    }
}

/// One recorded attempt against one endpoint. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Endpoint URL the attempt was made against
    pub endpoint: String,
    /// Position of the endpoint in the pool's declaration order
    pub endpoint_index: usize,
    /// Wall-clock start of the attempt
    pub started_at: DateTime<Utc>,
    /// Time spent in the transport
    #[serde(rename = "duration_ms", with = "duration_millis")]
    pub duration: Duration,
    /// Attempt outcome
    pub outcome: AttemptOutcome,
}

impl AttemptRecord {
    /// Create a new attempt record
    pub fn new(
        endpoint: impl Into<String>,
        endpoint_index: usize,
        started_at: DateTime<Utc>,
        duration: Duration,
        outcome: AttemptOutcome,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            endpoint_index,
            started_at,
            duration,
            outcome,
        }
    }
}

impl fmt::Display for AttemptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} after {}ms",
            self.endpoint,
            self.outcome,
            self.duration.as_millis()
        )
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
