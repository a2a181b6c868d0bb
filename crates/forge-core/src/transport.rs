//! The transport contract between the proxy and a remote endpoint.

use crate::error::TransportError;
use crate::types::{AgentOutput, EndpointUrl, Task};
use async_trait::async_trait;
use std::time::Duration;

/// One remote invocation against one endpoint.
///
/// Implementations enforce `timeout` themselves; callers never poll.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Execute a task on the given endpoint
    async fn invoke(
        &self,
        endpoint: &EndpointUrl,
        task: &Task,
        timeout: Duration,
    ) -> Result<AgentOutput, TransportError>;

    /// Probe the endpoint's health route
    async fn health_check(
        &self,
        endpoint: &EndpointUrl,
        timeout: Duration,
    ) -> Result<(), TransportError>;

    /// Transport name for logs
    fn name(&self) -> &'static str {
        "custom"
    }
}
