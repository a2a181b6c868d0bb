//! Event emitter that logs through `tracing`.

use forge_core::{EventEmitter, ProxyEvent};
use tracing::{debug, error, info, instrument, warn};

/// Logs every proxy event with structured fields
#[derive(Debug, Clone, Default)]
pub struct TracingEventEmitter {
    namespace: String,
}

impl TracingEventEmitter {
    /// Create a new tracing event emitter
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

#[async_trait::async_trait]
impl EventEmitter for TracingEventEmitter {
    #[instrument(skip_all, fields(namespace = %self.namespace))]
    async fn emit(&self, event: ProxyEvent) {
        match &event {
            ProxyEvent::AttemptStarted {
                agent,
                call_id,
                endpoint,
                attempt,
                ..
            } => {
                debug!(
                    agent = %agent,
                    call_id = %call_id,
                    endpoint = %endpoint,
                    attempt = attempt,
                    "Attempt started"
                );
            }
            ProxyEvent::AttemptFailed {
                agent,
                call_id,
                endpoint,
                attempt,
                outcome,
                duration_ms,
                will_failover,
                ..
            } => {
                warn!(
                    agent = %agent,
                    call_id = %call_id,
                    endpoint = %endpoint,
                    attempt = attempt,
                    outcome = %outcome,
                    duration_ms = duration_ms,
                    will_failover = will_failover,
                    "Attempt failed"
                );
            }
            ProxyEvent::CallSucceeded {
                agent,
                call_id,
                endpoint,
                attempts,
                duration_ms,
                ..
            } => {
                info!(
                    agent = %agent,
                    call_id = %call_id,
                    endpoint = %endpoint,
                    attempts = attempts,
                    duration_ms = duration_ms,
                    "Call succeeded"
                );
            }
            ProxyEvent::CacheHit {
                agent,
                call_id,
                fingerprint,
                ..
            } => {
                debug!(
                    agent = %agent,
                    call_id = %call_id,
                    fingerprint = %fingerprint,
                    "Served from cache"
                );
            }
            ProxyEvent::CallExhausted {
                agent,
                call_id,
                attempts,
                ..
            } => {
                let summary: Vec<String> = attempts.iter().map(ToString::to_string).collect();
                error!(
                    agent = %agent,
                    call_id = %call_id,
                    attempts = attempts.len(),
                    history = ?summary,
                    "All attempts failed"
                );
            }
            ProxyEvent::CallFailed {
                agent,
                call_id,
                error_code,
                message,
                ..
            } => {
                error!(
                    agent = %agent,
                    call_id = %call_id,
                    error_code = %error_code,
                    message = %message,
                    "Call failed"
                );
            }
        }
    }
}
