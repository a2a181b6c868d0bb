//! A single candidate endpoint and its health state.
//!
//! Health follows a hysteresis rule: an endpoint only turns unhealthy after
//! `unhealthy_after` consecutive failures and only recovers after
//! `healthy_after` consecutive successes. An endpoint that has never been
//! observed is `Unknown` and is treated as available.

use forge_core::{AttemptRecord, EndpointUrl};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Health status of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Never observed
    #[default]
    Unknown,
    /// Accepting calls
    Healthy,
    /// Failed repeatedly; only used as a last resort
    Unhealthy,
}

impl HealthStatus {
    /// Whether the dispatcher should prefer this endpoint
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unhealthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Healthy => write!(f, "healthy"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Consecutive-result thresholds for health transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthThresholds {
    /// Consecutive failures before an endpoint turns unhealthy
    pub unhealthy_after: u32,
    /// Consecutive successes before an unhealthy endpoint recovers
    pub healthy_after: u32,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            unhealthy_after: 3,
            healthy_after: 3,
        }
    }
}

#[derive(Debug, Default)]
struct HealthState {
    status: HealthStatus,
    consecutive_failures: u32,
    consecutive_successes: u32,
    total_successes: u64,
    total_failures: u64,
    last_probe: Option<Instant>,
}

impl HealthState {
    /// Apply one observation. Returns the previous status on a transition.
    fn observe(&mut self, success: bool, thresholds: HealthThresholds) -> Option<HealthStatus> {
        let previous = self.status;

        if success {
            self.consecutive_successes = self.consecutive_successes.saturating_add(1);
            self.consecutive_failures = 0;
            match self.status {
                HealthStatus::Unknown => self.status = HealthStatus::Healthy,
                HealthStatus::Unhealthy
                    if self.consecutive_successes >= thresholds.healthy_after =>
                {
                    self.status = HealthStatus::Healthy;
                }
                _ => {}
            }
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.consecutive_successes = 0;
            if self.status != HealthStatus::Unhealthy
                && self.consecutive_failures >= thresholds.unhealthy_after
            {
                self.status = HealthStatus::Unhealthy;
            }
        }

        (previous != self.status).then_some(previous)
    }
}

/// One endpoint in a pool
#[derive(Debug)]
pub struct Endpoint {
    index: usize,
    url: EndpointUrl,
    thresholds: HealthThresholds,
    state: Mutex<HealthState>,
    in_flight: AtomicU32,
    history: Mutex<VecDeque<AttemptRecord>>,
    history_size: usize,
}

impl Endpoint {
    /// Create a new endpoint at `index` in its pool's declaration order
    #[must_use]
    pub fn new(
        index: usize,
        url: EndpointUrl,
        thresholds: HealthThresholds,
        history_size: usize,
    ) -> Self {
        Self {
            index,
            url,
            thresholds,
            state: Mutex::new(HealthState::default()),
            in_flight: AtomicU32::new(0),
            history: Mutex::new(VecDeque::with_capacity(history_size)),
            history_size,
        }
    }

    /// Position in declaration order
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Endpoint URL
    #[must_use]
    pub fn url(&self) -> &EndpointUrl {
        &self.url
    }

    /// Current health status
    #[must_use]
    pub fn status(&self) -> HealthStatus {
        self.state.lock().status
    }

    /// Consecutive failures observed
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    /// Calls currently in flight against this endpoint
    #[must_use]
    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Record the result of a call attempt
    pub fn record_result(&self, success: bool) {
        let transition = {
            let mut state = self.state.lock();
            if success {
                state.total_successes += 1;
            } else {
                state.total_failures += 1;
            }
            state
                .observe(success, self.thresholds)
                .map(|previous| (previous, state.status, state.consecutive_failures))
        };

        if let Some((from, to, failures)) = transition {
            self.log_transition(from, to, failures);
        }
    }

    /// Record the result of a health probe.
    ///
    /// A failed probe marks the endpoint unhealthy at once. A successful probe
    /// counts toward the recovery streak like a successful call.
    pub fn record_probe(&self, success: bool, now: Instant) {
        let transition = {
            let mut state = self.state.lock();
            state.last_probe = Some(now);
            let previous = state.status;
            if success {
                state.observe(true, self.thresholds);
            } else {
                state.consecutive_successes = 0;
                state.status = HealthStatus::Unhealthy;
            }
            (previous != state.status).then_some((
                previous,
                state.status,
                state.consecutive_failures,
            ))
        };

        if let Some((from, to, failures)) = transition {
            self.log_transition(from, to, failures);
        }
    }

    /// Whether a probe is due at `now`. Claims the slot when it is, so
    /// concurrent callers probe an endpoint at most once per interval.
    pub fn claim_probe(&self, interval: Duration, now: Instant) -> bool {
        let mut state = self.state.lock();
        let due = state
            .last_probe
            .map_or(true, |last| now.saturating_duration_since(last) >= interval);
        if due {
            state.last_probe = Some(now);
        }
        due
    }

    fn log_transition(&self, from: HealthStatus, to: HealthStatus, failures: u32) {
        match to {
            HealthStatus::Unhealthy => warn!(
                endpoint = %self.url,
                from = %from,
                consecutive_failures = failures,
                "Endpoint marked unhealthy"
            ),
            _ => info!(
                endpoint = %self.url,
                from = %from,
                to = %to,
                "Endpoint health changed"
            ),
        }
    }

    /// Append an attempt to the bounded history
    pub fn push_history(&self, record: AttemptRecord) {
        if self.history_size == 0 {
            return;
        }
        let mut history = self.history.lock();
        while history.len() >= self.history_size {
            history.pop_front();
        }
        history.push_back(record);
    }

    /// Most recent attempts, oldest first
    #[must_use]
    pub fn recent_attempts(&self) -> Vec<AttemptRecord> {
        self.history.lock().iter().cloned().collect()
    }

    /// Mark one more call in flight until the guard is dropped
    #[must_use]
    pub fn acquire(self: &Arc<Self>) -> InFlightGuard {
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(endpoint = %self.url, in_flight = now, "Endpoint acquired");
        InFlightGuard {
            endpoint: Arc::clone(self),
        }
    }

    /// Point-in-time view for diagnostics
    #[must_use]
    pub fn snapshot(&self) -> EndpointSnapshot {
        let state = self.state.lock();
        EndpointSnapshot {
            index: self.index,
            url: self.url.to_string(),
            status: state.status,
            consecutive_failures: state.consecutive_failures,
            consecutive_successes: state.consecutive_successes,
            total_successes: state.total_successes,
            total_failures: state.total_failures,
            in_flight: self.in_flight(),
            recent_attempts: self.recent_attempts(),
        }
    }
}

/// In-flight marker for an endpoint
///
/// The count is released when dropped, including when the owning call is
/// cancelled.
#[derive(Debug)]
pub struct InFlightGuard {
    endpoint: Arc<Endpoint>,
}

impl InFlightGuard {
    /// Endpoint this guard belongs to
    #[must_use]
    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let previous = self.endpoint.in_flight.fetch_sub(1, Ordering::AcqRel);
        debug!(
            endpoint = %self.endpoint.url,
            in_flight = previous.saturating_sub(1),
            "Endpoint released"
        );
    }
}

/// Endpoint state at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSnapshot {
    /// Position in declaration order
    pub index: usize,
    /// Endpoint URL
    pub url: String,
    /// Health status
    pub status: HealthStatus,
    /// Consecutive failures
    pub consecutive_failures: u32,
    /// Consecutive successes
    pub consecutive_successes: u32,
    /// Successful attempts since construction
    pub total_successes: u64,
    /// Failed attempts since construction
    pub total_failures: u64,
    /// Calls in flight
    pub in_flight: u32,
    /// Most recent attempts, oldest first
    pub recent_attempts: Vec<AttemptRecord>,
}

impl EndpointSnapshot {
    /// Success rate over all recorded attempts, if any
    #[must_use]
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.total_successes + self.total_failures;
        (total > 0).then(|| self.total_successes as f64 / total as f64)
    }
}
