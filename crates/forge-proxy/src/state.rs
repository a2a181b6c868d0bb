//! Per-call lifecycle.

use forge_core::CallId;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Lifecycle state of one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// Not started
    Idle,
    /// Selecting an endpoint and running an attempt
    Dispatching,
    /// An attempt failed and a failover was granted
    Retrying,
    /// An output was produced
    Succeeded,
    /// Every permitted attempt failed
    Exhausted,
    /// Stopped by authentication failure or cancellation
    Failed,
}

impl CallState {
    /// Whether the call is over
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Exhausted | Self::Failed)
    }

    /// Whether moving to `next` is a legal transition
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Dispatching | Self::Succeeded | Self::Failed)
                | (
                    Self::Dispatching,
                    Self::Succeeded | Self::Retrying | Self::Exhausted | Self::Failed
                )
                | (Self::Retrying, Self::Dispatching | Self::Failed)
        )
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Dispatching => write!(f, "dispatching"),
            Self::Retrying => write!(f, "retrying"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Tracks the state of one call and logs transitions
#[derive(Debug)]
pub(crate) struct CallTracker {
    call_id: CallId,
    state: CallState,
}

impl CallTracker {
    pub(crate) fn new(call_id: CallId) -> Self {
        Self {
            call_id,
            state: CallState::Idle,
        }
    }

    pub(crate) fn state(&self) -> CallState {
        self.state
    }

    pub(crate) fn transition(&mut self, next: CallState) {
        if self.state == next {
            return;
        }
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal call transition {} -> {}",
            self.state,
            next
        );
        debug!(
            call_id = %self.call_id,
            from = %self.state,
            to = %next,
            "Call state transition"
        );
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut tracker = CallTracker::new(CallId::new());
        assert_eq!(tracker.state(), CallState::Idle);
        tracker.transition(CallState::Dispatching);
        tracker.transition(CallState::Retrying);
        tracker.transition(CallState::Dispatching);
        tracker.transition(CallState::Succeeded);
        assert!(tracker.state().is_terminal());
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!CallState::Idle.can_transition_to(CallState::Retrying));
        assert!(!CallState::Retrying.can_transition_to(CallState::Exhausted));
        assert!(!CallState::Succeeded.can_transition_to(CallState::Dispatching));
        assert!(!CallState::Exhausted.can_transition_to(CallState::Dispatching));
    }

    #[test]
    fn test_cache_hit_skips_dispatch() {
        assert!(CallState::Idle.can_transition_to(CallState::Succeeded));
    }
}
