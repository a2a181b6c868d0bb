//! Integration tests for the Agent Forge A2A client
//!
//! These tests drive a real `RemoteAgentProxy` over HTTP against mock agent
//! servers and cover:
//! - Failover across endpoints
//! - Load balancing strategies
//! - Response caching
//! - Authentication failures
//! - Health probing
//! - End-to-end flows from a configuration file

pub mod fixtures;
pub mod helpers;
pub mod mock_agents;

// Re-export commonly used items
pub use fixtures::*;
pub use helpers::*;
pub use mock_agents::*;

#[cfg(test)]
mod auth_tests;
#[cfg(test)]
mod balancing_tests;
#[cfg(test)]
mod cache_tests;
#[cfg(test)]
mod e2e_tests;
#[cfg(test)]
mod failover_tests;
#[cfg(test)]
mod health_tests;
