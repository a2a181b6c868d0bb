//! Fixed set of candidate endpoints for one logical remote agent.

use crate::endpoint::{Endpoint, EndpointSnapshot, HealthStatus, HealthThresholds};
use forge_core::{AttemptOutcome, AttemptRecord, EndpointUrl, ProxyError};
use std::sync::Arc;
use tracing::debug;

/// Pool configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Health transition thresholds
    pub thresholds: HealthThresholds,
    /// Attempts kept per endpoint
    pub history_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            thresholds: HealthThresholds::default(),
            history_size: 20,
        }
    }
}

/// Primary endpoint followed by the failover list, in declaration order.
///
/// Composition is fixed at construction.
#[derive(Debug)]
pub struct EndpointPool {
    endpoints: Vec<Arc<Endpoint>>,
    config: PoolConfig,
}

impl EndpointPool {
    /// Create a pool from URLs in declaration order
    ///
    /// # Errors
    /// Returns `ProxyError::Configuration` if `urls` is empty
    pub fn new(urls: Vec<EndpointUrl>, config: PoolConfig) -> Result<Self, ProxyError> {
        if urls.is_empty() {
            return Err(ProxyError::configuration(
                "Endpoint pool requires at least one endpoint",
            ));
        }

        let endpoints = urls
            .into_iter()
            .enumerate()
            .map(|(index, url)| {
                Arc::new(Endpoint::new(
                    index,
                    url,
                    config.thresholds,
                    config.history_size,
                ))
            })
            .collect();

        Ok(Self { endpoints, config })
    }

    /// Every endpoint in declaration order
    #[must_use]
    pub fn all_endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    /// Endpoint at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Arc<Endpoint>> {
        self.endpoints.get(index)
    }

    /// Number of endpoints
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always false for a constructed pool
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Pool configuration
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Update an endpoint's health counters with a call result
    pub fn mark_result(&self, endpoint: &Endpoint, success: bool) {
        endpoint.record_result(success);
    }

    /// Store an attempt in the endpoint's history and update its health.
    ///
    /// Authentication failures are kept in history but do not count against
    /// the endpoint: a rejected credential says nothing about its health.
    pub fn record_attempt(&self, endpoint: &Endpoint, record: AttemptRecord) {
        let counted = !matches!(record.outcome, AttemptOutcome::AuthError { .. });
        let success = record.outcome.is_success();

        debug!(
            endpoint = %endpoint.url(),
            outcome = record.outcome.label(),
            duration_ms = record.duration.as_millis() as u64,
            "Attempt recorded"
        );

        endpoint.push_history(record);
        if counted {
            self.mark_result(endpoint, success);
        }
    }

    /// Number of endpoints not currently unhealthy
    #[must_use]
    pub fn available_count(&self) -> usize {
        self.endpoints
            .iter()
            .filter(|e| e.status() != HealthStatus::Unhealthy)
            .count()
    }

    /// Snapshot of every endpoint
    #[must_use]
    pub fn snapshot(&self) -> Vec<EndpointSnapshot> {
        self.endpoints.iter().map(|e| e.snapshot()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn pool(urls: &[&str]) -> EndpointPool {
        let urls = urls
            .iter()
            .map(|u| EndpointUrl::parse(u).unwrap())
            .collect();
        EndpointPool::new(urls, PoolConfig::default()).unwrap()
    }

    fn record(outcome: AttemptOutcome) -> AttemptRecord {
        AttemptRecord::new("http://a", 0, Utc::now(), Duration::from_millis(3), outcome)
    }

    #[test]
    fn test_empty_pool_rejected() {
        let err = EndpointPool::new(Vec::new(), PoolConfig::default()).unwrap_err();
        assert_eq!(err.error_code(), "configuration_error");
    }

    #[test]
    fn test_declaration_order() {
        let pool = pool(&["http://a", "http://b", "http://c"]);
        let urls: Vec<String> = pool
            .all_endpoints()
            .iter()
            .map(|e| e.url().to_string())
            .collect();
        assert_eq!(urls, vec!["http://a", "http://b", "http://c"]);
        assert_eq!(pool.get(2).unwrap().index(), 2);
    }

    #[test]
    fn test_record_attempt_updates_health() {
        let pool = pool(&["http://a"]);
        let a = &pool.all_endpoints()[0];

        for _ in 0..3 {
            pool.record_attempt(a, record(AttemptOutcome::Timeout));
        }
        assert_eq!(a.status(), HealthStatus::Unhealthy);
        assert_eq!(pool.available_count(), 0);
        assert_eq!(a.recent_attempts().len(), 3);
    }

    #[test]
    fn test_auth_failure_does_not_count() {
        let pool = pool(&["http://a"]);
        let a = &pool.all_endpoints()[0];

        pool.record_attempt(
            a,
            record(AttemptOutcome::AuthError {
                message: "rejected".into(),
            }),
        );
        assert_eq!(a.consecutive_failures(), 0);
        assert_eq!(a.recent_attempts().len(), 1);
    }

    #[test]
    fn test_concurrent_marks_are_not_lost() {
        let pool = Arc::new(pool(&["http://a"]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    let a = Arc::clone(&pool.all_endpoints()[0]);
                    for _ in 0..100 {
                        pool.mark_result(&a, false);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let snapshot = &pool.snapshot()[0];
        assert_eq!(snapshot.total_failures, 800);
        assert_eq!(snapshot.consecutive_failures, 800);
    }
}
