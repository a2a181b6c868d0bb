//! JSON bodies exchanged with a remote agent.

use forge_core::{AgentOutput, Task};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Request body posted to the execute path
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRequest<'a> {
    /// Task description
    pub task: &'a str,
    /// Structured context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<&'a serde_json::Value>,
    /// Request metadata
    pub metadata: WireMetadata<'a>,
}

/// Metadata sent with every request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMetadata<'a> {
    /// Correlation ID for this attempt
    pub request_id: String,
    /// Caller-supplied task metadata
    #[serde(flatten)]
    pub extra: &'a HashMap<String, String>,
}

impl<'a> WireRequest<'a> {
    /// Build a request body for a task
    #[must_use]
    pub fn new(task: &'a Task, request_id: impl Into<String>) -> Self {
        Self {
            task: &task.description,
            context: task.context.as_ref(),
            metadata: WireMetadata {
                request_id: request_id.into(),
                extra: &task.metadata,
            },
        }
    }
}

/// Successful response body
#[derive(Debug, Clone, Deserialize)]
pub struct WireResponse {
    /// Agent output
    pub output: serde_json::Value,
    /// Response metadata
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl From<WireResponse> for AgentOutput {
    fn from(response: WireResponse) -> Self {
        let mut output = Self::new(response.output);
        output.metadata = response.metadata;
        output
    }
}

/// Structured error object
#[derive(Debug, Clone, Deserialize)]
pub struct WireError {
    /// Error code; numeric codes are accepted
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    /// Error message
    #[serde(default)]
    pub message: Option<String>,
}

impl WireError {
    /// Code rendered as a string
    #[must_use]
    pub fn code_string(&self) -> Option<String> {
        match &self.code {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Error body, either wrapped in `error` or bare
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireErrorBody {
    /// `{"error": {"code": ..., "message": ...}}`
    Wrapped {
        /// Error object
        error: WireError,
    },
    /// `{"code": ..., "message": ...}`
    Bare(WireError),
}

impl WireErrorBody {
    /// Parse an error body. Returns `None` unless a code or message is present.
    #[must_use]
    pub fn parse(body: &str) -> Option<WireError> {
        let parsed: Self = serde_json::from_str(body).ok()?;
        let error = match parsed {
            Self::Wrapped { error } | Self::Bare(error) => error,
        };
        (error.code.is_some() || error.message.is_some()).then_some(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let task = Task::new("summarize")
            .with_context(serde_json::json!({"doc": 1}))
            .with_metadata("tenant", "acme");
        let body = serde_json::to_value(WireRequest::new(&task, "req-1")).unwrap();
        assert_eq!(body["task"], "summarize");
        assert_eq!(body["context"]["doc"], 1);
        assert_eq!(body["metadata"]["requestId"], "req-1");
        assert_eq!(body["metadata"]["tenant"], "acme");
    }

    #[test]
    fn test_request_omits_missing_context() {
        let task = Task::new("summarize");
        let body = serde_json::to_value(WireRequest::new(&task, "req-1")).unwrap();
        assert!(body.get("context").is_none());
    }

    #[test]
    fn test_parse_error_bodies() {
        let wrapped = WireErrorBody::parse(r#"{"error": {"code": "busy", "message": "later"}}"#).unwrap();
        assert_eq!(wrapped.code_string().as_deref(), Some("busy"));
        assert_eq!(wrapped.message.as_deref(), Some("later"));

        let bare = WireErrorBody::parse(r#"{"code": 42, "message": "odd"}"#).unwrap();
        assert_eq!(bare.code_string().as_deref(), Some("42"));

        assert!(WireErrorBody::parse(r#"{"output": "x"}"#).is_none());
        assert!(WireErrorBody::parse("not json").is_none());
    }

    #[test]
    fn test_response_into_output() {
        let response: WireResponse =
            serde_json::from_str(r#"{"output": "done", "metadata": {"model": "m"}}"#).unwrap();
        let output = AgentOutput::from(response);
        assert_eq!(output.content(), "done");
        assert_eq!(output.metadata["model"], "m");
        assert!(!output.cached);
    }
}
