//! Domain types for remote agent invocation.

use crate::error::ProxyError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use url::Url;
use uuid::Uuid;

/// A validated HTTP(S) endpoint URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EndpointUrl(Url);

impl EndpointUrl {
    /// Parse and validate an endpoint URL.
    ///
    /// # Errors
    /// Returns `ProxyError::Configuration` if the URL is empty, malformed,
    /// or uses a scheme other than `http`/`https`.
    pub fn parse(value: &str) -> Result<Self, ProxyError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ProxyError::configuration("Endpoint URL cannot be empty"));
        }

        let url = Url::parse(trimmed).map_err(|e| {
            ProxyError::configuration(format!("Invalid endpoint URL '{trimmed}': {e}"))
        })?;

        match url.scheme() {
            "http" | "https" => Ok(Self(url)),
            other => Err(ProxyError::configuration(format!(
                "Unsupported scheme '{other}' in endpoint URL '{trimmed}'"
            ))),
        }
    }

    /// Get the URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Get the underlying URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.0
    }

    /// Append a path to this endpoint, keeping any path prefix already on it.
    ///
    /// `http://host/agents/writer` joined with `/a2a/execute` yields
    /// `http://host/agents/writer/a2a/execute`.
    ///
    /// # Errors
    /// Returns `ProxyError::Configuration` if the result is not a valid URL.
    pub fn join_path(&self, path: &str) -> Result<Url, ProxyError> {
        let base = self.0.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        let joined = if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        };
        Url::parse(&joined)
            .map_err(|e| ProxyError::configuration(format!("Invalid URL '{joined}': {e}")))
    }
}

impl fmt::Display for EndpointUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Url always renders a trailing slash for bare hosts; drop it for logs.
        f.write_str(self.0.as_str().trim_end_matches('/'))
    }
}

impl TryFrom<String> for EndpointUrl {
    type Error = ProxyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EndpointUrl> for String {
    fn from(value: EndpointUrl) -> Self {
        value.0.into()
    }
}

/// A unit of work sent to a remote agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Natural-language task description
    pub description: String,
    /// Structured context that affects the result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    /// Free-form metadata forwarded to the remote agent; not part of the fingerprint
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Task {
    /// Create a task from a description.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            context: None,
            metadata: HashMap::new(),
        }
    }

    /// Attach structured context.
    #[must_use]
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Derive the default cache fingerprint for this task.
    ///
    /// The digest covers the description and context. Object keys in the
    /// context serialize in sorted order, so equal contexts always hash the same.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(self.description.as_bytes());
        hasher.update([0u8]);
        if let Some(context) = &self.context {
            hasher.update(context.to_string().as_bytes());
        }
        Fingerprint(hex::encode(hasher.finalize()))
    }
}

/// Opaque cache key for a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Create a fingerprint from a caller-derived key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a successful remote agent execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    /// Output payload returned by the agent
    pub output: serde_json::Value,
    /// Metadata returned alongside the output
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Endpoint that produced the output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub served_by: Option<String>,
    /// Whether the output came from the response cache
    #[serde(default)]
    pub cached: bool,
}

impl AgentOutput {
    /// Create an output from a payload.
    #[must_use]
    pub fn new(output: serde_json::Value) -> Self {
        Self {
            output,
            metadata: serde_json::Map::new(),
            served_by: None,
            cached: false,
        }
    }

    /// Create a plain-text output.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(serde_json::Value::String(text.into()))
    }

    /// Record which endpoint served this output.
    #[must_use]
    pub fn with_served_by(mut self, endpoint: impl Into<String>) -> Self {
        self.served_by = Some(endpoint.into());
        self
    }

    /// Output rendered as text: strings verbatim, anything else as JSON.
    #[must_use]
    pub fn content(&self) -> String {
        match &self.output {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// Identifier correlating every event of one `run` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(Uuid);

impl CallId {
    /// Generate a new random call ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
