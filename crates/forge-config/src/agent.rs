//! Agent definitions and the top-level configuration file.

use crate::remote::RemoteAgentConfig;
use crate::validation::ValidationReport;
use forge_telemetry::{LogFormat, TracingConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A named remote agent and the capabilities it advertises
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefinition {
    /// Unique agent name
    pub name: String,
    /// Role description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// What the agent is meant to achieve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    /// Tools the remote agent exposes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    /// How to reach the agent
    pub a2a: RemoteAgentConfig,
}

impl AgentDefinition {
    /// Create a definition
    pub fn new(name: impl Into<String>, a2a: RemoteAgentConfig) -> Self {
        Self {
            name: name.into(),
            role: None,
            objective: None,
            tools: Vec::new(),
            a2a,
        }
    }

    /// Set the role
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the objective
    #[must_use]
    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = Some(objective.into());
        self
    }

    /// Name as used in environment variable keys
    #[must_use]
    pub fn env_key(&self) -> String {
        self.name.to_ascii_uppercase().replace('-', "_")
    }

    /// Validate the definition
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();

        if self.name.is_empty() {
            report.error("name", "is required");
        } else if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            report.error(
                "name",
                "may only contain letters, digits, '-' and '_'",
            );
        }

        report.merge("a2a", self.a2a.validate());
        report
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySettings {
    /// Default log level, overridden by `RUST_LOG`
    #[serde(default = "default_level")]
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
    /// Export spans through OpenTelemetry
    #[serde(default)]
    pub otel_enabled: bool,
}

impl TelemetrySettings {
    /// Tracing setup for `service_name` with these settings
    #[must_use]
    pub fn tracing_config(&self, service_name: &str) -> TracingConfig {
        TracingConfig::new(service_name)
            .with_log_level(self.level.clone())
            .with_format(self.format)
            .with_otel(self.otel_enabled)
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            otel_enabled: false,
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgeConfig {
    /// Remote agents
    #[serde(default)]
    pub agents: Vec<AgentDefinition>,
    /// Logging
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl ForgeConfig {
    /// Find an agent by name
    #[must_use]
    pub fn agent(&self, name: &str) -> Option<&AgentDefinition> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// Agent names in declaration order
    #[must_use]
    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name.as_str()).collect()
    }

    /// Validate every agent
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();

        if self.agents.is_empty() {
            report.warning("agents", "no agents are defined");
        }

        let mut names = HashSet::new();
        for (i, agent) in self.agents.iter().enumerate() {
            let prefix = format!("agents[{i}]");
            if !agent.name.is_empty() && !names.insert(agent.name.as_str()) {
                report.error(
                    format!("{prefix}.name"),
                    format!("duplicate agent name '{}'", agent.name),
                );
            }
            report.merge(&prefix, agent.validate());
        }

        if tracing_level_is_unknown(&self.telemetry.level) {
            report.warning(
                "telemetry.level",
                format!("unknown level '{}'", self.telemetry.level),
            );
        }

        report
    }
}

fn tracing_level_is_unknown(level: &str) -> bool {
    !matches!(
        level.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error" | "off"
    )
}
