//! Endpoint selection and the failover budget.
//!
//! A [`Dispatcher`] is shared by every call on a proxy and owns the only
//! cross-call selection state, the round-robin cursor. Each call carries its
//! own [`DispatchState`].

use crate::endpoint::{Endpoint, InFlightGuard};
use crate::pool::EndpointPool;
use crate::strategy::{LoadBalancingStrategy, TieBreak};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Result of asking the dispatcher for an endpoint
#[derive(Debug)]
pub enum Selection {
    /// Try this endpoint next; it already counts as in flight
    Endpoint(InFlightGuard),
    /// The failover budget is spent
    Exhausted,
}

/// Per-call dispatch state. Never shared between calls.
#[derive(Debug, Clone)]
pub struct DispatchState {
    strategy: LoadBalancingStrategy,
    tried: Vec<bool>,
    failover_count: u32,
    attempts: u32,
    last: Option<usize>,
    attempts_per_endpoint: Vec<u32>,
    finished_at: Vec<Option<Instant>>,
}

impl DispatchState {
    /// Fresh state for a call against a pool of `pool_size` endpoints
    #[must_use]
    pub fn new(strategy: LoadBalancingStrategy, pool_size: usize) -> Self {
        Self {
            strategy,
            tried: vec![false; pool_size],
            failover_count: 0,
            attempts: 0,
            last: None,
            attempts_per_endpoint: vec![0; pool_size],
            finished_at: vec![None; pool_size],
        }
    }

    /// Strategy in use for this call
    #[must_use]
    pub fn strategy(&self) -> LoadBalancingStrategy {
        self.strategy
    }

    /// Failovers taken so far
    #[must_use]
    pub fn failover_count(&self) -> u32 {
        self.failover_count
    }

    /// Attempts started so far
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Index of the most recently selected endpoint
    #[must_use]
    pub fn last_endpoint(&self) -> Option<usize> {
        self.last
    }

    /// Whether the current endpoint was already attempted earlier in this call
    #[must_use]
    pub fn is_repeat(&self) -> bool {
        self.repeat_count() > 0
    }

    /// Earlier attempts on the current endpoint within this call
    #[must_use]
    pub fn repeat_count(&self) -> u32 {
        self.last
            .and_then(|i| self.attempts_per_endpoint.get(i))
            .map_or(0, |n| n.saturating_sub(1))
    }

    /// Whether the endpoint at `index` was tried in the current cycle
    #[must_use]
    pub fn was_tried(&self, index: usize) -> bool {
        self.tried.get(index).copied().unwrap_or(false)
    }

    /// Mark the current endpoint's attempt as finished at `now`
    pub fn finish_attempt(&mut self, now: Instant) {
        if let Some(slot) = self.last.and_then(|i| self.finished_at.get_mut(i)) {
            *slot = Some(now);
        }
    }

    /// Time since the previous attempt on the current endpoint finished.
    ///
    /// `None` for the first attempt on an endpoint.
    #[must_use]
    pub fn since_previous_attempt(&self, now: Instant) -> Option<Duration> {
        if !self.is_repeat() {
            return None;
        }
        self.last
            .and_then(|i| self.finished_at.get(i).copied().flatten())
            .map(|finished| now.saturating_duration_since(finished))
    }

    fn resize(&mut self, pool_size: usize) {
        if self.tried.len() != pool_size {
            self.tried = vec![false; pool_size];
            self.attempts_per_endpoint = vec![0; pool_size];
            self.finished_at = vec![None; pool_size];
        }
    }

    fn record_selection(&mut self, index: usize) {
        if let Some(slot) = self.tried.get_mut(index) {
            *slot = true;
        }
        if let Some(count) = self.attempts_per_endpoint.get_mut(index) {
            *count += 1;
        }
        self.last = Some(index);
        self.attempts += 1;
    }
}

/// Chooses endpoints for calls on one proxy
#[derive(Debug)]
pub struct Dispatcher {
    strategy: LoadBalancingStrategy,
    tie_break: TieBreak,
    max_failovers: u32,
    cursor: Mutex<usize>,
}

impl Dispatcher {
    /// Create a dispatcher
    #[must_use]
    pub fn new(strategy: LoadBalancingStrategy, tie_break: TieBreak, max_failovers: u32) -> Self {
        Self {
            strategy,
            tie_break,
            max_failovers,
            cursor: Mutex::new(0),
        }
    }

    /// Configured strategy
    #[must_use]
    pub fn strategy(&self) -> LoadBalancingStrategy {
        self.strategy
    }

    /// Configured failover budget
    #[must_use]
    pub fn max_failovers(&self) -> u32 {
        self.max_failovers
    }

    /// State for a new call
    #[must_use]
    pub fn start_call(&self, pool: &EndpointPool) -> DispatchState {
        DispatchState::new(self.strategy, pool.len())
    }

    /// Pick the next endpoint for a call and mark it in flight.
    ///
    /// A call gets one initial attempt plus one per granted failover. Healthy
    /// untried endpoints are preferred; when every untried endpoint is
    /// unhealthy they are still used as a last resort. Once every endpoint
    /// has been tried a new cycle starts over the whole pool.
    ///
    /// Choosing and acquiring happen under one lock, so concurrent calls
    /// never read the same least-connections minimum.
    pub fn select_next(&self, pool: &EndpointPool, state: &mut DispatchState) -> Selection {
        if pool.is_empty() || state.attempts > state.failover_count {
            return Selection::Exhausted;
        }

        state.resize(pool.len());
        if state.tried.iter().all(|t| *t) {
            debug!(attempts = state.attempts, "All endpoints tried, starting new cycle");
            state.tried.iter_mut().for_each(|t| *t = false);
        }

        let untried: Vec<&Arc<Endpoint>> = pool
            .all_endpoints()
            .iter()
            .filter(|e| !state.was_tried(e.index()))
            .collect();
        let healthy: Vec<&Arc<Endpoint>> = untried
            .iter()
            .copied()
            .filter(|e| e.status().is_available())
            .collect();
        let last_resort = healthy.is_empty();
        let candidates = if last_resort { untried } else { healthy };

        let guard = {
            let mut cursor = self.cursor.lock();
            let Some(chosen) = self.choose(pool.len(), &candidates, &mut cursor) else {
                return Selection::Exhausted;
            };
            chosen.acquire()
        };

        let chosen = guard.endpoint();
        state.record_selection(chosen.index());
        debug!(
            strategy = %self.strategy,
            endpoint = %chosen.url(),
            attempt = state.attempts,
            last_resort,
            repeat = state.is_repeat(),
            "Endpoint selected"
        );
        Selection::Endpoint(guard)
    }

    /// Consume one failover from the budget. Returns false when none remain.
    pub fn begin_failover(&self, state: &mut DispatchState) -> bool {
        if state.failover_count < self.max_failovers {
            state.failover_count += 1;
            true
        } else {
            false
        }
    }

    fn choose<'a>(
        &self,
        len: usize,
        candidates: &[&'a Arc<Endpoint>],
        cursor: &mut usize,
    ) -> Option<&'a Arc<Endpoint>> {
        match self.strategy {
            LoadBalancingStrategy::Priority => candidates.first().copied(),
            LoadBalancingStrategy::RoundRobin => {
                let start = *cursor % len;
                let chosen = (0..len)
                    .map(|offset| (start + offset) % len)
                    .find_map(|idx| candidates.iter().copied().find(|e| e.index() == idx))?;
                *cursor = (chosen.index() + 1) % len;
                Some(chosen)
            }
            LoadBalancingStrategy::LeastConnections => {
                let fewest = candidates.iter().map(|e| e.in_flight()).min()?;
                let tied: Vec<&'a Arc<Endpoint>> = candidates
                    .iter()
                    .copied()
                    .filter(|e| e.in_flight() == fewest)
                    .collect();
                match self.tie_break {
                    TieBreak::DeclarationOrder => tied.first().copied(),
                    TieBreak::Random => tied.choose(&mut rand::thread_rng()).copied(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::HealthStatus;
    use crate::pool::PoolConfig;
    use forge_core::EndpointUrl;

    fn pool(n: usize) -> EndpointPool {
        let urls = (0..n)
            .map(|i| EndpointUrl::parse(&format!("http://ep{i}")).unwrap())
            .collect();
        EndpointPool::new(urls, PoolConfig::default()).unwrap()
    }

    fn select(d: &Dispatcher, pool: &EndpointPool, state: &mut DispatchState) -> Option<usize> {
        match d.select_next(pool, state) {
            Selection::Endpoint(guard) => Some(guard.endpoint().index()),
            Selection::Exhausted => None,
        }
    }

    fn mark_unhealthy(endpoint: &Endpoint) {
        for _ in 0..3 {
            endpoint.record_result(false);
        }
        assert_eq!(endpoint.status(), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_attempts_bounded_by_failover_budget() {
        for max_failovers in 0..5 {
            let pool = pool(3);
            let d = Dispatcher::new(LoadBalancingStrategy::Priority, TieBreak::default(), max_failovers);
            let mut state = d.start_call(&pool);
            let mut attempts = 0;
            while select(&d, &pool, &mut state).is_some() {
                attempts += 1;
                if !d.begin_failover(&mut state) {
                    break;
                }
            }
            assert_eq!(attempts, max_failovers + 1);
            assert!(state.failover_count() <= max_failovers);
        }
    }

    #[test]
    fn test_no_selection_without_failover() {
        let pool = pool(2);
        let d = Dispatcher::new(LoadBalancingStrategy::Priority, TieBreak::default(), 3);
        let mut state = d.start_call(&pool);
        assert_eq!(select(&d, &pool, &mut state), Some(0));
        // A second selection needs a granted failover first
        assert_eq!(select(&d, &pool, &mut state), None);
    }

    #[test]
    fn test_priority_declared_order() {
        let pool = pool(3);
        let d = Dispatcher::new(LoadBalancingStrategy::Priority, TieBreak::default(), 2);
        let mut state = d.start_call(&pool);
        let mut order = Vec::new();
        while let Some(idx) = select(&d, &pool, &mut state) {
            order.push(idx);
            d.begin_failover(&mut state);
        }
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_priority_skips_unhealthy() {
        let pool = pool(3);
        mark_unhealthy(&pool.all_endpoints()[0]);
        let d = Dispatcher::new(LoadBalancingStrategy::Priority, TieBreak::default(), 2);
        let mut state = d.start_call(&pool);
        assert_eq!(select(&d, &pool, &mut state), Some(1));
        d.begin_failover(&mut state);
        assert_eq!(select(&d, &pool, &mut state), Some(2));
        d.begin_failover(&mut state);
        // Unhealthy endpoint is still a last resort
        assert_eq!(select(&d, &pool, &mut state), Some(0));
    }

    #[test]
    fn test_priority_all_unhealthy_attempts_first() {
        let pool = pool(3);
        for endpoint in pool.all_endpoints() {
            mark_unhealthy(endpoint);
        }
        let d = Dispatcher::new(LoadBalancingStrategy::Priority, TieBreak::default(), 0);
        let mut state = d.start_call(&pool);
        assert_eq!(select(&d, &pool, &mut state), Some(0));
    }

    #[test]
    fn test_round_robin_distributes_evenly() {
        let pool = pool(3);
        let d = Dispatcher::new(LoadBalancingStrategy::RoundRobin, TieBreak::default(), 2);
        let mut counts = [0; 3];
        let mut order = Vec::new();
        for _ in 0..6 {
            let mut state = d.start_call(&pool);
            let idx = select(&d, &pool, &mut state).unwrap();
            counts[idx] += 1;
            order.push(idx);
        }
        assert_eq!(counts, [2, 2, 2]);
        assert_eq!(order, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_round_robin_skips_unhealthy() {
        let pool = pool(3);
        mark_unhealthy(&pool.all_endpoints()[1]);
        let d = Dispatcher::new(LoadBalancingStrategy::RoundRobin, TieBreak::default(), 0);
        let order: Vec<usize> = (0..4)
            .map(|_| {
                let mut state = d.start_call(&pool);
                select(&d, &pool, &mut state).unwrap()
            })
            .collect();
        assert_eq!(order, vec![0, 2, 0, 2]);
    }

    #[test]
    fn test_least_connections() {
        let pool = pool(3);
        let endpoints = pool.all_endpoints();
        let _a = endpoints[0].acquire();
        let _b1 = endpoints[1].acquire();
        let _b2 = endpoints[1].acquire();

        let d = Dispatcher::new(LoadBalancingStrategy::LeastConnections, TieBreak::default(), 0);
        let mut state = d.start_call(&pool);
        assert_eq!(select(&d, &pool, &mut state), Some(2));
    }

    #[test]
    fn test_least_connections_ties_by_declaration_order() {
        let pool = pool(3);
        let _c = pool.all_endpoints()[2].acquire();
        let d = Dispatcher::new(LoadBalancingStrategy::LeastConnections, TieBreak::DeclarationOrder, 0);
        for _ in 0..5 {
            let mut state = d.start_call(&pool);
            assert_eq!(select(&d, &pool, &mut state), Some(0));
        }
    }

    #[test]
    fn test_least_connections_random_tie_break_stays_in_tie() {
        let pool = pool(3);
        let _a = pool.all_endpoints()[0].acquire();
        let d = Dispatcher::new(LoadBalancingStrategy::LeastConnections, TieBreak::Random, 0);
        for _ in 0..20 {
            let mut state = d.start_call(&pool);
            let idx = select(&d, &pool, &mut state).unwrap();
            assert!(idx == 1 || idx == 2);
        }
    }

    #[test]
    fn test_new_cycle_and_repeat_detection() {
        let pool = pool(1);
        let d = Dispatcher::new(LoadBalancingStrategy::Priority, TieBreak::default(), 2);
        let mut state = d.start_call(&pool);

        assert_eq!(select(&d, &pool, &mut state), Some(0));
        assert!(!state.is_repeat());

        assert!(d.begin_failover(&mut state));
        assert_eq!(select(&d, &pool, &mut state), Some(0));
        assert!(state.is_repeat());
        assert_eq!(state.repeat_count(), 1);

        assert!(d.begin_failover(&mut state));
        assert_eq!(select(&d, &pool, &mut state), Some(0));
        assert_eq!(state.repeat_count(), 2);

        assert!(!d.begin_failover(&mut state));
        assert_eq!(select(&d, &pool, &mut state), None);
    }

    #[test]
    fn test_alternating_endpoints_are_repeats_on_second_cycle() {
        let pool = pool(2);
        let d = Dispatcher::new(LoadBalancingStrategy::Priority, TieBreak::default(), 3);
        let mut state = d.start_call(&pool);
        let mut seen = Vec::new();
        while let Some(idx) = select(&d, &pool, &mut state) {
            seen.push((idx, state.is_repeat(), state.repeat_count()));
            d.begin_failover(&mut state);
        }
        // a, b, then a new cycle: a and b again, each once before
        assert_eq!(
            seen,
            vec![(0, false, 0), (1, false, 0), (0, true, 1), (1, true, 1)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_since_previous_attempt_on_same_endpoint() {
        let pool = pool(2);
        let d = Dispatcher::new(LoadBalancingStrategy::Priority, TieBreak::default(), 3);
        let mut state = d.start_call(&pool);

        assert_eq!(select(&d, &pool, &mut state), Some(0));
        assert_eq!(state.since_previous_attempt(Instant::now()), None);
        state.finish_attempt(Instant::now());

        tokio::time::advance(Duration::from_millis(40)).await;
        d.begin_failover(&mut state);
        assert_eq!(select(&d, &pool, &mut state), Some(1));
        assert_eq!(state.since_previous_attempt(Instant::now()), None);
        state.finish_attempt(Instant::now());

        tokio::time::advance(Duration::from_millis(60)).await;
        d.begin_failover(&mut state);
        assert_eq!(select(&d, &pool, &mut state), Some(0));
        assert_eq!(
            state.since_previous_attempt(Instant::now()),
            Some(Duration::from_millis(100))
        );
    }

    #[test]
    fn test_selection_holds_endpoint_in_flight() {
        let pool = pool(3);
        let d = Dispatcher::new(LoadBalancingStrategy::LeastConnections, TieBreak::default(), 0);

        let held: Vec<InFlightGuard> = (0..6)
            .map(|_| {
                let mut state = d.start_call(&pool);
                match d.select_next(&pool, &mut state) {
                    Selection::Endpoint(guard) => guard,
                    Selection::Exhausted => panic!("pool is not empty"),
                }
            })
            .collect();

        let counts: Vec<u32> = pool.all_endpoints().iter().map(|e| e.in_flight()).collect();
        assert_eq!(counts, vec![2, 2, 2]);
        drop(held);
        assert!(pool.all_endpoints().iter().all(|e| e.in_flight() == 0));
    }
}
