//! Delay before repeating an attempt on the same endpoint.
//!
//! Switching to a different endpoint is never delayed; this only applies
//! when the dispatcher hands back the endpoint that just failed.

use std::time::Duration;

/// Same-endpoint retry delay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryDelay {
    /// Minimum wait before any same-endpoint repeat
    pub base: Duration,
    /// Growth factor for each further repeat
    pub multiplier: f64,
    /// Upper bound on the grown delay
    pub max: Option<Duration>,
}

impl Default for RetryDelay {
    fn default() -> Self {
        Self {
            base: Duration::ZERO,
            multiplier: 1.0,
            max: None,
        }
    }
}

impl RetryDelay {
    /// Fixed delay with no growth
    #[must_use]
    pub fn fixed(base: Duration) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }

    /// Set the growth factor
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set the upper bound
    #[must_use]
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = Some(max);
        self
    }

    /// Whether any delay is configured
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.base.is_zero()
    }

    /// Delay before the `repeat`-th repeat of one endpoint within a call (1-based).
    ///
    /// `base * multiplier^(repeat - 1)`, capped at `max` but never below `base`.
    #[must_use]
    pub fn delay_for_repeat(&self, repeat: u32) -> Duration {
        if repeat == 0 || self.base.is_zero() {
            return Duration::ZERO;
        }

        let base = self.base.as_millis() as f64;
        let exponent = i32::try_from(repeat - 1).unwrap_or(i32::MAX);
        let mut delay = base * self.multiplier.max(1.0).powi(exponent);
        if let Some(max) = self.max {
            delay = delay.min(max.as_millis() as f64);
        }
        let delay = delay.max(base);

        Duration::from_millis(delay as u64)
    }
}
