//! Proxy construction from a validated configuration.

use crate::proxy::RemoteAgentProxy;
use forge_config::{AgentDefinition, RemoteAgentConfig};
use forge_core::{EventEmitter, Fingerprint, NoOpEventEmitter, ProxyError, Task, Transport};
use forge_resilience::{CacheConfig, ResponseCache, RetryDelay};
use forge_routing::{Dispatcher, EndpointPool, HealthChecker, PoolConfig};
use forge_transport::HttpTransport;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Derives the cache key for a task
pub type FingerprintFn = Arc<dyn Fn(&Task) -> Fingerprint + Send + Sync>;

/// Builder for [`RemoteAgentProxy`]
pub struct RemoteAgentProxyBuilder {
    name: String,
    config: Option<RemoteAgentConfig>,
    transport: Option<Arc<dyn Transport>>,
    emitter: Option<Arc<dyn EventEmitter>>,
    fingerprint: Option<FingerprintFn>,
}

impl fmt::Debug for RemoteAgentProxyBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteAgentProxyBuilder")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("emitter", &self.emitter)
            .field("fingerprint", &self.fingerprint.is_some())
            .finish()
    }
}

impl RemoteAgentProxyBuilder {
    /// Create a builder for the named agent
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: None,
            transport: None,
            emitter: None,
            fingerprint: None,
        }
    }

    /// Builder pre-filled from an agent definition
    #[must_use]
    pub fn from_definition(definition: &AgentDefinition) -> Self {
        Self::new(definition.name.clone()).config(definition.a2a.clone())
    }

    /// Set the remote configuration
    #[must_use]
    pub fn config(mut self, config: RemoteAgentConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a custom transport instead of HTTP
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Send lifecycle events to `emitter`
    #[must_use]
    pub fn emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Derive cache keys with `f` instead of [`Task::fingerprint`]
    #[must_use]
    pub fn fingerprint_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Task) -> Fingerprint + Send + Sync + 'static,
    {
        self.fingerprint = Some(Arc::new(f));
        self
    }

    /// Validate the configuration and build the proxy
    ///
    /// # Errors
    /// Returns `ProxyError::Configuration` when the configuration is missing
    /// or invalid, or the HTTP transport cannot be created
    pub fn build(self) -> Result<RemoteAgentProxy, ProxyError> {
        let Some(config) = self.config else {
            return Err(ProxyError::configuration(format!(
                "agent '{}' has no a2a configuration",
                self.name
            )));
        };

        let report = config.validate();
        if report.has_errors() {
            return Err(ProxyError::configuration(format!(
                "agent '{}': {report}",
                self.name
            )));
        }
        for issue in report.warnings() {
            warn!(agent = %self.name, field = %issue.field, "{}", issue.message);
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(http_transport(&config)?),
        };

        let pool = EndpointPool::new(
            config.endpoint_urls()?,
            PoolConfig {
                thresholds: config.health_check.thresholds(),
                history_size: config.history_size,
            },
        )?;

        let dispatcher = Dispatcher::new(
            config.failover.strategy,
            config.failover.tie_break,
            config.effective_max_failovers(),
        );

        let mut retry_delay = RetryDelay::fixed(config.failover.retry_delay)
            .with_multiplier(config.failover.backoff_multiplier);
        if let Some(max) = config.failover.max_retry_delay {
            retry_delay = retry_delay.with_max(max);
        }

        let cache = config.cache.enabled.then(|| {
            ResponseCache::new(CacheConfig {
                max_entries: config.cache.max_entries,
                default_ttl: config.cache.ttl,
            })
        });

        let health = HealthChecker::new(
            Arc::clone(&transport),
            config.health_check.interval,
            config.health_check.timeout,
        );

        debug!(
            agent = %self.name,
            endpoints = pool.len(),
            strategy = %dispatcher.strategy(),
            max_failovers = dispatcher.max_failovers(),
            cache = cache.is_some(),
            health_check = config.health_check.enabled,
            transport = transport.name(),
            "Remote agent proxy built"
        );

        Ok(RemoteAgentProxy {
            name: self.name,
            transport,
            pool,
            dispatcher,
            retry_delay,
            timeout: config.timeout,
            cache,
            cache_ttl: config.cache.ttl,
            health,
            refresh_health: config.health_check.enabled,
            emitter: self.emitter.unwrap_or_else(no_op_emitter),
            fingerprint: self.fingerprint.unwrap_or_else(task_fingerprint),
        })
    }
}

fn no_op_emitter() -> Arc<dyn EventEmitter> {
    Arc::new(NoOpEventEmitter)
}

fn task_fingerprint() -> FingerprintFn {
    Arc::new(Task::fingerprint)
}

fn http_transport(config: &RemoteAgentConfig) -> Result<HttpTransport, ProxyError> {
    let mut builder = HttpTransport::builder()
        .path(config.path.clone())
        .health_path(config.health_check.path.clone())
        .secret_token(config.authentication.token.clone())
        .auth_required(config.authentication.required);
    if let Some(connect_timeout) = config.connect_timeout {
        builder = builder.connect_timeout(connect_timeout);
    }
    builder.build()
}
