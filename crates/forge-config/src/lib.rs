//! # Forge Config
//!
//! Configuration for remote agents.
//!
//! This crate provides:
//! - `RemoteAgentConfig` with the A2A client settings of one agent
//! - `ForgeConfig` declaring named agents
//! - File loading (YAML, TOML, JSON) with environment overrides
//! - Validation reporting every issue at once

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agent;
pub mod duration;
pub mod error;
pub mod loader;
pub mod remote;
pub mod validation;

pub use agent::{AgentDefinition, ForgeConfig, TelemetrySettings};
pub use error::{ConfigError, ConfigResult};
pub use loader::{parse_str, ConfigFormat, ConfigLoader, ENV_PREFIX};
pub use remote::{
    AuthenticationConfig, CacheSettings, FailoverConfig, HealthCheckConfig, RemoteAgentConfig,
};
pub use validation::{Severity, ValidationIssue, ValidationReport};
