//! The agent execution contract.

use crate::error::ProxyResult;
use crate::types::{AgentOutput, Task};
use async_trait::async_trait;

/// Anything that can execute a task and return an output.
///
/// Remote proxies and in-process agents share this contract so callers can
/// hold either behind `Arc<dyn Agent>`.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name, unique within a configuration
    fn name(&self) -> &str;

    /// Execute a task
    async fn run(&self, task: Task) -> ProxyResult<AgentOutput>;
}
