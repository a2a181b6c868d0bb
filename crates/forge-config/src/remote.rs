//! Settings for one remote agent.

use crate::validation::ValidationReport;
use forge_core::{EndpointUrl, ProxyError};
use forge_routing::{HealthThresholds, LoadBalancingStrategy, TieBreak};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// A2A client configuration for one remote agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAgentConfig {
    /// Primary endpoint
    pub server_url: String,

    /// Path the task is posted to
    #[serde(default = "default_path")]
    pub path: String,

    /// Per-attempt timeout
    #[serde(default = "default_timeout", with = "crate::duration")]
    pub timeout: Duration,

    /// Connection establishment timeout
    #[serde(
        default,
        with = "crate::duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub connect_timeout: Option<Duration>,

    /// Failover behavior
    #[serde(default)]
    pub failover: FailoverConfig,

    /// Credentials
    #[serde(default)]
    pub authentication: AuthenticationConfig,

    /// Response caching
    #[serde(default)]
    pub cache: CacheSettings,

    /// Health probing and hysteresis thresholds
    #[serde(default)]
    pub health_check: HealthCheckConfig,

    /// Attempts kept per endpoint for diagnostics
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

/// Failover settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailoverConfig {
    /// Alternate endpoints, tried after the primary in this order
    #[serde(default)]
    pub servers: Vec<String>,

    /// Selection strategy
    #[serde(default)]
    pub strategy: LoadBalancingStrategy,

    /// Tie-break for least-connections
    #[serde(default)]
    pub tie_break: TieBreak,

    /// Minimum wait before repeating an attempt on the same endpoint
    #[serde(default, with = "crate::duration")]
    pub retry_delay: Duration,

    /// Failovers allowed per call; defaults to one pass over the failover list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_failovers: Option<u32>,

    /// Growth factor for each further repeat of one endpoint within a call
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Cap on the grown same-endpoint delay
    #[serde(
        default,
        with = "crate::duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_retry_delay: Option<Duration>,
}

/// Credential settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationConfig {
    /// Bearer token; never serialized
    #[serde(default, skip_serializing)]
    pub token: Option<SecretString>,

    /// Environment variable holding the token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    /// Whether the remote agent rejects unauthenticated calls
    #[serde(default)]
    pub required: bool,
}

/// Response cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSettings {
    /// Whether successful outputs are cached
    #[serde(default)]
    pub enabled: bool,

    /// Entry lifetime
    #[serde(default = "default_cache_ttl", with = "crate::duration")]
    pub ttl: Duration,

    /// Maximum entries; 0 means unbounded
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

/// Health probing settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckConfig {
    /// Whether endpoints are probed before calls
    #[serde(default)]
    pub enabled: bool,

    /// Path probed with GET
    #[serde(default = "default_health_path")]
    pub path: String,

    /// Minimum time between probes of one endpoint
    #[serde(default = "default_health_interval", with = "crate::duration")]
    pub interval: Duration,

    /// Probe timeout
    #[serde(default = "default_health_timeout", with = "crate::duration")]
    pub timeout: Duration,

    /// Consecutive failures before an endpoint turns unhealthy
    #[serde(default = "default_threshold")]
    pub unhealthy_threshold: u32,

    /// Consecutive successes before an unhealthy endpoint recovers
    #[serde(default = "default_threshold")]
    pub healthy_threshold: u32,
}

fn default_path() -> String {
    "/a2a/execute".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_history_size() -> usize {
    20
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(300)
}

fn default_cache_max_entries() -> usize {
    1000
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_health_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_health_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_threshold() -> u32 {
    3
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            strategy: LoadBalancingStrategy::default(),
            tie_break: TieBreak::default(),
            retry_delay: Duration::ZERO,
            max_failovers: None,
            backoff_multiplier: default_backoff_multiplier(),
            max_retry_delay: None,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: default_cache_ttl(),
            max_entries: default_cache_max_entries(),
        }
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_health_path(),
            interval: default_health_interval(),
            timeout: default_health_timeout(),
            unhealthy_threshold: default_threshold(),
            healthy_threshold: default_threshold(),
        }
    }
}

impl HealthCheckConfig {
    /// Hysteresis thresholds for the endpoint pool
    #[must_use]
    pub fn thresholds(&self) -> HealthThresholds {
        HealthThresholds {
            unhealthy_after: self.unhealthy_threshold,
            healthy_after: self.healthy_threshold,
        }
    }
}

impl AuthenticationConfig {
    /// Whether a token is available
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty())
    }
}

impl RemoteAgentConfig {
    /// Create a configuration for a single endpoint with defaults
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            path: default_path(),
            timeout: default_timeout(),
            connect_timeout: None,
            failover: FailoverConfig::default(),
            authentication: AuthenticationConfig::default(),
            cache: CacheSettings::default(),
            health_check: HealthCheckConfig::default(),
            history_size: default_history_size(),
        }
    }

    /// Set the failover servers
    #[must_use]
    pub fn with_failover_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failover.servers = servers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the strategy
    #[must_use]
    pub fn with_strategy(mut self, strategy: LoadBalancingStrategy) -> Self {
        self.failover.strategy = strategy;
        self
    }

    /// Set the failover budget
    #[must_use]
    pub fn with_max_failovers(mut self, max_failovers: u32) -> Self {
        self.failover.max_failovers = Some(max_failovers);
        self
    }

    /// Set the same-endpoint retry delay
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.failover.retry_delay = delay;
        self
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the bearer token
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.authentication.token = Some(SecretString::new(token.into()));
        self
    }

    /// Require authentication
    #[must_use]
    pub fn with_auth_required(mut self, required: bool) -> Self {
        self.authentication.required = required;
        self
    }

    /// Enable response caching with the given TTL
    #[must_use]
    pub fn with_cache(mut self, ttl: Duration) -> Self {
        self.cache.enabled = true;
        self.cache.ttl = ttl;
        self
    }

    /// Enable health probing
    #[must_use]
    pub fn with_health_check(mut self, interval: Duration) -> Self {
        self.health_check.enabled = true;
        self.health_check.interval = interval;
        self
    }

    /// Set the hysteresis thresholds
    #[must_use]
    pub fn with_thresholds(mut self, unhealthy: u32, healthy: u32) -> Self {
        self.health_check.unhealthy_threshold = unhealthy;
        self.health_check.healthy_threshold = healthy;
        self
    }

    /// Failovers allowed per call
    #[must_use]
    pub fn effective_max_failovers(&self) -> u32 {
        self.failover
            .max_failovers
            .unwrap_or_else(|| u32::try_from(self.failover.servers.len()).unwrap_or(u32::MAX))
    }

    /// Primary endpoint followed by failover servers, parsed
    ///
    /// # Errors
    /// Returns `ProxyError::Configuration` for the first invalid URL
    pub fn endpoint_urls(&self) -> Result<Vec<EndpointUrl>, ProxyError> {
        std::iter::once(&self.server_url)
            .chain(&self.failover.servers)
            .map(|url| EndpointUrl::parse(url))
            .collect()
    }

    /// Validate the configuration, collecting every issue
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();

        if self.server_url.trim().is_empty() {
            report.error("serverUrl", "is required");
        } else if let Err(e) = EndpointUrl::parse(&self.server_url) {
            report.error("serverUrl", e.to_string());
        }

        let mut seen = HashSet::new();
        seen.insert(self.server_url.trim().trim_end_matches('/').to_string());
        for (i, server) in self.failover.servers.iter().enumerate() {
            let field = format!("failover.servers[{i}]");
            if let Err(e) = EndpointUrl::parse(server) {
                report.error(field, e.to_string());
            } else if !seen.insert(server.trim().trim_end_matches('/').to_string()) {
                report.warning(field, format!("duplicate endpoint '{server}'"));
            }
        }

        if !self.path.starts_with('/') {
            report.error("path", "must start with '/'");
        }

        if self.timeout.is_zero() {
            report.error("timeout", "must be greater than 0");
        }
        if self.connect_timeout.is_some_and(|t| t.is_zero()) {
            report.error("connectTimeout", "must be greater than 0");
        }

        let multiplier = self.failover.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            report.error("failover.backoffMultiplier", "must be at least 1.0");
        }
        if let Some(max) = self.failover.max_retry_delay {
            if max < self.failover.retry_delay {
                report.warning(
                    "failover.maxRetryDelay",
                    "is below retryDelay; retryDelay is used",
                );
            }
        }
        if self.failover.max_failovers.is_some_and(|n| n > 0)
            && self.failover.servers.is_empty()
            && self.failover.retry_delay.is_zero()
        {
            report.warning(
                "failover.maxFailovers",
                "repeats the only endpoint without any retryDelay",
            );
        }

        if self.cache.enabled && self.cache.ttl.is_zero() {
            report.error("cache.ttl", "must be greater than 0 when the cache is enabled");
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            report.warning("cache.maxEntries", "is 0; the cache is unbounded");
        }

        let health = &self.health_check;
        if health.unhealthy_threshold == 0 {
            report.error("healthCheck.unhealthyThreshold", "must be greater than 0");
        }
        if health.healthy_threshold == 0 {
            report.error("healthCheck.healthyThreshold", "must be greater than 0");
        }
        if health.enabled {
            if health.interval.is_zero() {
                report.error("healthCheck.interval", "must be greater than 0");
            }
            if health.timeout.is_zero() {
                report.error("healthCheck.timeout", "must be greater than 0");
            }
            if !health.path.starts_with('/') {
                report.error("healthCheck.path", "must start with '/'");
            }
        }

        let auth = &self.authentication;
        if auth.required && !auth.has_token() {
            let message = match &auth.token_env {
                Some(var) => format!("is required but {var} is not set"),
                None => "is required but no token is configured".to_string(),
            };
            report.warning("authentication.token", message);
        }

        report
    }
}
