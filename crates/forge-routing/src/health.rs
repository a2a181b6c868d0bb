//! Opportunistic health probing.
//!
//! Probes pre-mark endpoints unhealthy before a call is routed to them. They
//! never replace per-call failure handling.

use crate::endpoint::{Endpoint, HealthStatus};
use crate::pool::EndpointPool;
use forge_core::Transport;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Result of probing one endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    /// Position in declaration order
    pub index: usize,
    /// Endpoint URL
    pub endpoint: String,
    /// Whether the probe succeeded
    pub reachable: bool,
    /// Probe round-trip time in milliseconds
    pub latency_ms: u64,
    /// Health status after applying the probe
    pub status: HealthStatus,
    /// Failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Probes pool endpoints through a transport
#[derive(Debug, Clone)]
pub struct HealthChecker {
    transport: Arc<dyn Transport>,
    interval: Duration,
    timeout: Duration,
}

impl HealthChecker {
    /// Create a health checker
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, interval: Duration, timeout: Duration) -> Self {
        Self {
            transport,
            interval,
            timeout,
        }
    }

    /// Minimum time between probes of one endpoint
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Probe every endpoint whose interval has elapsed. Returns the number of
    /// endpoints probed.
    pub async fn refresh(&self, pool: &EndpointPool) -> usize {
        let now = Instant::now();
        let due: Vec<&Arc<Endpoint>> = pool
            .all_endpoints()
            .iter()
            .filter(|e| e.claim_probe(self.interval, now))
            .collect();

        if due.is_empty() {
            return 0;
        }

        debug!(count = due.len(), "Refreshing endpoint health");
        let probed = due.len();
        join_all(due.into_iter().map(|e| self.probe(e))).await;
        probed
    }

    /// Probe every endpoint now, regardless of interval
    pub async fn probe_all(&self, pool: &EndpointPool) -> Vec<ProbeReport> {
        join_all(pool.all_endpoints().iter().map(|e| self.probe(e))).await
    }

    async fn probe(&self, endpoint: &Endpoint) -> ProbeReport {
        let started = Instant::now();
        let result = self
            .transport
            .health_check(endpoint.url(), self.timeout)
            .await;
        let latency = started.elapsed();

        endpoint.record_probe(result.is_ok(), Instant::now());

        let error = match result {
            Ok(()) => None,
            Err(e) => {
                warn!(endpoint = %endpoint.url(), error = %e, "Health probe failed");
                Some(e.to_string())
            }
        };

        ProbeReport {
            index: endpoint.index(),
            endpoint: endpoint.url().to_string(),
            reachable: error.is_none(),
            latency_ms: latency.as_millis() as u64,
            status: endpoint.status(),
            error,
        }
    }
}
