//! Test fixtures and sample data

use forge_config::RemoteAgentConfig;
use forge_core::Task;
use forge_routing::LoadBalancingStrategy;
use std::time::Duration;

/// A review task with context and metadata
pub fn review_task() -> Task {
    Task::new("Review the attached diff")
        .with_context(serde_json::json!({ "diff": "- a\n+ b" }))
        .with_metadata("tenant", "acme")
}

/// A plain task
pub fn simple_task(description: &str) -> Task {
    Task::new(description)
}

/// Configuration over `primary` and `failover` with a short timeout
pub fn agent_config(primary: &str, failover: &[&str]) -> RemoteAgentConfig {
    RemoteAgentConfig::new(primary)
        .with_failover_servers(failover.iter().copied())
        .with_timeout(Duration::from_secs(2))
}

/// Round-robin configuration over `servers`
pub fn round_robin_config(servers: &[&str]) -> RemoteAgentConfig {
    let (primary, rest) = servers.split_first().expect("at least one server");
    agent_config(primary, rest).with_strategy(LoadBalancingStrategy::RoundRobin)
}

/// YAML configuration for one agent named `name`
pub fn yaml_config(name: &str, primary: &str, failover: &[&str]) -> String {
    let servers = if failover.is_empty() {
        "        servers: []\n".to_string()
    } else {
        let items = failover
            .iter()
            .map(|s| format!("          - {s}\n"))
            .collect::<String>();
        format!("        servers:\n{items}")
    };
    format!(
        "agents:
  - name: {name}
    role: reviewer
    a2a:
      serverUrl: {primary}
      timeout: 2s
      failover:
{servers}      cache:
        enabled: true
        ttl: 1m
"
    )
}
