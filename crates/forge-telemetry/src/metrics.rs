//! Prometheus metrics for proxy events.

use forge_core::{EventEmitter, ProxyEvent};
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

/// Metrics registration error
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// A metric could not be created or registered
    #[error("Failed to register metrics: {0}")]
    Registration(#[from] prometheus::Error),
}

/// Records proxy events as Prometheus metrics
#[derive(Debug, Clone)]
pub struct MetricsEventEmitter {
    /// Attempts by agent, endpoint and outcome
    pub attempts_total: IntCounterVec,
    /// Calls by agent and result
    pub calls_total: IntCounterVec,
    /// Cache hits by agent
    pub cache_hits_total: IntCounterVec,
    /// Attempt duration by agent and endpoint
    pub attempt_duration_seconds: HistogramVec,
}

impl MetricsEventEmitter {
    /// Create the metrics and register them in `registry`
    ///
    /// # Errors
    /// Returns error if a metric with the same name is already registered
    pub fn new(registry: &Registry) -> Result<Self, MetricsError> {
        let attempts_total = IntCounterVec::new(
            Opts::new("a2a_attempts_total", "Remote call attempts"),
            &["agent", "endpoint", "outcome"],
        )?;

        let calls_total = IntCounterVec::new(
            Opts::new("a2a_calls_total", "Remote agent calls by result"),
            &["agent", "result"],
        )?;

        let cache_hits_total = IntCounterVec::new(
            Opts::new("a2a_cache_hits_total", "Calls answered from the response cache"),
            &["agent"],
        )?;

        let attempt_duration_seconds = HistogramVec::new(
            HistogramOpts::new("a2a_attempt_duration_seconds", "Remote call attempt duration")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["agent", "endpoint"],
        )?;

        registry.register(Box::new(attempts_total.clone()))?;
        registry.register(Box::new(calls_total.clone()))?;
        registry.register(Box::new(cache_hits_total.clone()))?;
        registry.register(Box::new(attempt_duration_seconds.clone()))?;

        Ok(Self {
            attempts_total,
            calls_total,
            cache_hits_total,
            attempt_duration_seconds,
        })
    }

    fn observe_attempt(&self, agent: &str, endpoint: &str, outcome: &str, duration_ms: u64) {
        self.attempts_total
            .with_label_values(&[agent, endpoint, outcome])
            .inc();
        self.attempt_duration_seconds
            .with_label_values(&[agent, endpoint])
            .observe(duration_ms as f64 / 1000.0);
    }
}

#[async_trait::async_trait]
impl EventEmitter for MetricsEventEmitter {
    async fn emit(&self, event: ProxyEvent) {
        match &event {
            ProxyEvent::AttemptStarted { .. } => {}
            ProxyEvent::AttemptFailed {
                agent,
                endpoint,
                outcome,
                duration_ms,
                ..
            } => {
                self.observe_attempt(agent, endpoint, outcome.label(), *duration_ms);
            }
            ProxyEvent::CallSucceeded {
                agent,
                endpoint,
                duration_ms,
                ..
            } => {
                self.observe_attempt(agent, endpoint, "success", *duration_ms);
                self.calls_total.with_label_values(&[agent, "success"]).inc();
            }
            ProxyEvent::CacheHit { agent, .. } => {
                self.cache_hits_total.with_label_values(&[agent]).inc();
                self.calls_total.with_label_values(&[agent, "cached"]).inc();
            }
            ProxyEvent::CallExhausted { agent, .. } => {
                self.calls_total
                    .with_label_values(&[agent, "exhausted"])
                    .inc();
            }
            ProxyEvent::CallFailed {
                agent, error_code, ..
            } => {
                self.calls_total
                    .with_label_values(&[agent.as_str(), error_code.as_str()])
                    .inc();
            }
        }
    }
}
