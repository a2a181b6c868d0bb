//! Load balancing strategies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the dispatcher picks the next endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalancingStrategy {
    /// First healthy endpoint in declaration order
    #[default]
    Priority,
    /// Rotate across healthy endpoints, shared across calls
    RoundRobin,
    /// Healthy endpoint with the fewest in-flight calls
    LeastConnections,
}

impl LoadBalancingStrategy {
    /// All strategies, for help output
    pub const ALL: [Self; 3] = [Self::Priority, Self::RoundRobin, Self::LeastConnections];

    /// Canonical configuration name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Priority => "priority",
            Self::RoundRobin => "round-robin",
            Self::LeastConnections => "least-connections",
        }
    }
}

impl fmt::Display for LoadBalancingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadBalancingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "priority" | "failover" => Ok(Self::Priority),
            "round-robin" | "roundrobin" => Ok(Self::RoundRobin),
            "least-connections" | "leastconnections" | "least-conn" => Ok(Self::LeastConnections),
            other => Err(format!(
                "unknown strategy '{other}' (expected priority, round-robin or least-connections)"
            )),
        }
    }
}

/// How least-connections resolves ties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Earliest declared endpoint wins
    #[default]
    DeclarationOrder,
    /// Uniformly random among tied endpoints
    Random,
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeclarationOrder => f.write_str("declaration-order"),
            Self::Random => f.write_str("random"),
        }
    }
}
