//! The remote agent proxy.

use crate::builder::{FingerprintFn, RemoteAgentProxyBuilder};
use crate::state::{CallState, CallTracker};
use async_trait::async_trait;
use chrono::Utc;
use forge_core::{
    Agent, AgentOutput, AttemptOutcome, AttemptRecord, CallId, EventEmitter, ProxyError,
    ProxyEvent, ProxyResult, Task, Transport, TransportError,
};
use forge_resilience::{CacheStats, ResponseCache, RetryDelay};
use forge_routing::{
    Dispatcher, EndpointPool, EndpointSnapshot, HealthChecker, LoadBalancingStrategy, ProbeReport,
    Selection,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Point-in-time view of a proxy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxySnapshot {
    /// Agent name
    pub agent: String,
    /// Dispatch strategy
    pub strategy: LoadBalancingStrategy,
    /// Failovers allowed per call
    pub max_failovers: u32,
    /// Every endpoint in declaration order
    pub endpoints: Vec<EndpointSnapshot>,
    /// Cache statistics, if caching is enabled
    pub cache: Option<CacheStats>,
}

/// Invokes a remote agent through a pool of endpoints.
///
/// Every call consults the response cache first, then dispatches attempts
/// until one succeeds, the failover budget is spent, or the remote side
/// rejects the credential. Many calls may run concurrently on one proxy.
pub struct RemoteAgentProxy {
    pub(crate) name: String,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) pool: EndpointPool,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) retry_delay: RetryDelay,
    pub(crate) timeout: Duration,
    pub(crate) cache: Option<ResponseCache>,
    pub(crate) cache_ttl: Duration,
    pub(crate) health: HealthChecker,
    pub(crate) refresh_health: bool,
    pub(crate) emitter: Arc<dyn EventEmitter>,
    pub(crate) fingerprint: FingerprintFn,
}

impl fmt::Debug for RemoteAgentProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteAgentProxy")
            .field("name", &self.name)
            .field("transport", &self.transport.name())
            .field("endpoints", &self.pool.len())
            .field("strategy", &self.dispatcher.strategy())
            .field("max_failovers", &self.dispatcher.max_failovers())
            .field("timeout", &self.timeout)
            .field("cache", &self.cache.is_some())
            .field("refresh_health", &self.refresh_health)
            .finish_non_exhaustive()
    }
}

/// The shutdown signal fired
struct Cancelled;

impl RemoteAgentProxy {
    /// Create a new proxy builder
    pub fn builder(name: impl Into<String>) -> RemoteAgentProxyBuilder {
        RemoteAgentProxyBuilder::new(name)
    }

    /// Agent name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Endpoint pool
    #[must_use]
    pub fn pool(&self) -> &EndpointPool {
        &self.pool
    }

    /// Response cache, if enabled
    #[must_use]
    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    /// Per-attempt timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute a task on the remote agent
    ///
    /// # Errors
    /// - `ProxyError::Auth` when the credential is missing or rejected
    /// - `ProxyError::Exhausted` when every permitted attempt failed
    #[instrument(skip(self, task), fields(agent = %self.name))]
    pub async fn run(&self, task: Task) -> ProxyResult<AgentOutput> {
        self.execute(task, None).await
    }

    /// Execute a task, stopping when `shutdown` turns true.
    ///
    /// No attempt starts after the signal; an in-flight attempt is dropped.
    ///
    /// # Errors
    /// As [`run`](Self::run), plus `ProxyError::Cancelled`
    #[instrument(skip(self, task, shutdown), fields(agent = %self.name))]
    pub async fn run_cancellable(
        &self,
        task: Task,
        shutdown: watch::Receiver<bool>,
    ) -> ProxyResult<AgentOutput> {
        self.execute(task, Some(shutdown)).await
    }

    /// Probe every endpoint's health route now
    pub async fn probe_health(&self) -> Vec<ProbeReport> {
        self.health.probe_all(&self.pool).await
    }

    /// Snapshot of endpoint health and cache statistics
    #[must_use]
    pub fn snapshot(&self) -> ProxySnapshot {
        ProxySnapshot {
            agent: self.name.clone(),
            strategy: self.dispatcher.strategy(),
            max_failovers: self.dispatcher.max_failovers(),
            endpoints: self.pool.snapshot(),
            cache: self.cache.as_ref().map(ResponseCache::stats),
        }
    }

    async fn execute(
        &self,
        task: Task,
        mut shutdown: Option<watch::Receiver<bool>>,
    ) -> ProxyResult<AgentOutput> {
        let call_id = CallId::new();
        let mut tracker = CallTracker::new(call_id);

        if is_cancelled(shutdown.as_ref()) {
            tracker.transition(CallState::Failed);
            return Err(self.fail_cancelled(call_id, Vec::new()).await);
        }

        let fingerprint = self.cache.as_ref().map(|_| (self.fingerprint)(&task));
        if let (Some(cache), Some(fingerprint)) = (&self.cache, &fingerprint) {
            if let Some(mut output) = cache.get(fingerprint) {
                output.cached = true;
                tracker.transition(CallState::Succeeded);
                self.emitter
                    .emit(ProxyEvent::CacheHit {
                        agent: self.name.clone(),
                        call_id,
                        fingerprint: fingerprint.to_string(),
                        timestamp: Utc::now(),
                    })
                    .await;
                return Ok(output);
            }
        }

        if self.refresh_health
            && interruptible(&mut shutdown, self.health.refresh(&self.pool))
                .await
                .is_err()
        {
            tracker.transition(CallState::Failed);
            return Err(self.fail_cancelled(call_id, Vec::new()).await);
        }

        let mut dispatch = self.dispatcher.start_call(&self.pool);
        let mut attempts: Vec<AttemptRecord> = Vec::new();

        loop {
            tracker.transition(CallState::Dispatching);

            let guard = match self.dispatcher.select_next(&self.pool, &mut dispatch) {
                Selection::Endpoint(guard) => guard,
                Selection::Exhausted => break,
            };
            let endpoint = Arc::clone(guard.endpoint());

            if let Some(elapsed) = dispatch.since_previous_attempt(Instant::now()) {
                let delay = self
                    .retry_delay
                    .delay_for_repeat(dispatch.repeat_count())
                    .saturating_sub(elapsed);
                if !delay.is_zero() {
                    debug!(
                        call_id = %call_id,
                        endpoint = %endpoint.url(),
                        delay_ms = delay.as_millis() as u64,
                        "Waiting before repeating endpoint"
                    );
                    if interruptible(&mut shutdown, tokio::time::sleep(delay))
                        .await
                        .is_err()
                    {
                        drop(guard);
                        tracker.transition(CallState::Failed);
                        return Err(self.fail_cancelled(call_id, attempts).await);
                    }
                }
            }

            let attempt = dispatch.attempts();
            self.emitter
                .emit(ProxyEvent::AttemptStarted {
                    agent: self.name.clone(),
                    call_id,
                    endpoint: endpoint.url().to_string(),
                    attempt,
                    timestamp: Utc::now(),
                })
                .await;

            let started_at = Utc::now();
            let started = Instant::now();
            let invocation = self.transport.invoke(endpoint.url(), &task, self.timeout);
            let Ok(result) = interruptible(&mut shutdown, invocation).await else {
                drop(guard);
                tracker.transition(CallState::Failed);
                return Err(self.fail_cancelled(call_id, attempts).await);
            };
            let duration = started.elapsed();
            drop(guard);
            dispatch.finish_attempt(Instant::now());

            let outcome = match &result {
                Ok(_) => AttemptOutcome::Success,
                Err(e) => e.outcome(),
            };
            let record = AttemptRecord::new(
                endpoint.url().to_string(),
                endpoint.index(),
                started_at,
                duration,
                outcome.clone(),
            );
            self.pool.record_attempt(&endpoint, record.clone());
            attempts.push(record);

            let duration_ms = duration.as_millis() as u64;
            match result {
                Ok(output) => {
                    if let (Some(cache), Some(fingerprint)) = (&self.cache, fingerprint) {
                        cache.put(fingerprint, output.clone(), self.cache_ttl);
                    }
                    tracker.transition(CallState::Succeeded);
                    info!(
                        call_id = %call_id,
                        endpoint = %endpoint.url(),
                        attempts = attempt,
                        "Remote agent call succeeded"
                    );
                    self.emitter
                        .emit(ProxyEvent::CallSucceeded {
                            agent: self.name.clone(),
                            call_id,
                            endpoint: endpoint.url().to_string(),
                            attempts: attempt,
                            duration_ms,
                            timestamp: Utc::now(),
                        })
                        .await;
                    return Ok(output);
                }
                Err(TransportError::Auth {
                    endpoint: failed_on,
                    message,
                }) => {
                    tracker.transition(CallState::Failed);
                    warn!(
                        call_id = %call_id,
                        endpoint = %failed_on,
                        "Authentication failed, not failing over"
                    );
                    self.emitter
                        .emit(ProxyEvent::AttemptFailed {
                            agent: self.name.clone(),
                            call_id,
                            endpoint: endpoint.url().to_string(),
                            attempt,
                            outcome,
                            duration_ms,
                            will_failover: false,
                            timestamp: Utc::now(),
                        })
                        .await;
                    let error = ProxyError::auth(failed_on, message);
                    self.emit_failed(call_id, &error).await;
                    return Err(error);
                }
                Err(error) => {
                    let will_failover = self.dispatcher.begin_failover(&mut dispatch);
                    warn!(
                        call_id = %call_id,
                        attempt = attempt,
                        error = %error,
                        will_failover,
                        "Attempt failed"
                    );
                    self.emitter
                        .emit(ProxyEvent::AttemptFailed {
                            agent: self.name.clone(),
                            call_id,
                            endpoint: endpoint.url().to_string(),
                            attempt,
                            outcome,
                            duration_ms,
                            will_failover,
                            timestamp: Utc::now(),
                        })
                        .await;
                    if !will_failover {
                        break;
                    }
                    tracker.transition(CallState::Retrying);
                }
            }
        }

        tracker.transition(CallState::Exhausted);
        self.emitter
            .emit(ProxyEvent::CallExhausted {
                agent: self.name.clone(),
                call_id,
                attempts: attempts.clone(),
                timestamp: Utc::now(),
            })
            .await;
        Err(ProxyError::exhausted(attempts))
    }

    async fn fail_cancelled(&self, call_id: CallId, attempts: Vec<AttemptRecord>) -> ProxyError {
        debug!(call_id = %call_id, attempts = attempts.len(), "Call cancelled");
        let error = ProxyError::Cancelled { attempts };
        self.emit_failed(call_id, &error).await;
        error
    }

    async fn emit_failed(&self, call_id: CallId, error: &ProxyError) {
        self.emitter
            .emit(ProxyEvent::CallFailed {
                agent: self.name.clone(),
                call_id,
                error_code: error.error_code().to_string(),
                message: error.to_string(),
                timestamp: Utc::now(),
            })
            .await;
    }
}

#[async_trait]
impl Agent for RemoteAgentProxy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, task: Task) -> ProxyResult<AgentOutput> {
        Self::run(self, task).await
    }
}

fn is_cancelled(shutdown: Option<&watch::Receiver<bool>>) -> bool {
    shutdown.is_some_and(|rx| *rx.borrow())
}

/// Run `work` unless the shutdown signal fires first
async fn interruptible<F: Future>(
    shutdown: &mut Option<watch::Receiver<bool>>,
    work: F,
) -> Result<F::Output, Cancelled> {
    tokio::pin!(work);

    if let Some(rx) = shutdown.as_mut() {
        tokio::select! {
            biased;
            signalled = async { rx.wait_for(|cancelled| *cancelled).await.is_ok() } => {
                if signalled {
                    return Err(Cancelled);
                }
            }
            output = &mut work => return Ok(output),
        }
        // The sender is gone, so the signal can never fire.
        *shutdown = None;
    }

    Ok(work.await)
}
