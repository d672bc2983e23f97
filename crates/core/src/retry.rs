//! Bounded retry budgets and exponential backoff.
//!
//! Retry loops are driven by an explicit [`RetryBudget`] (attempt counter
//! plus ceiling) rather than recursion, so callers can stop between attempts
//! and tests can assert exact attempt counts.

use std::time::Duration;

/// Default number of attempts per remote call before the call is reported failed.
pub const DEFAULT_TRANSPORT_ATTEMPTS: u32 = 3;
/// Default number of generation attempts per pipeline slot.
pub const DEFAULT_SLOT_ATTEMPTS: u32 = 5;

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    /// Backoff that never sleeps. Useful for tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`BackoffConfig::max_delay`].
pub fn next_delay(current: Duration, config: &BackoffConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// Attempt counter with a fixed ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    max_attempts: u32,
    used: u32,
}

impl RetryBudget {
    /// A budget of `max_attempts` (at least one attempt is always allowed).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            used: 0,
        }
    }

    /// Consume one attempt. Returns the 1-based attempt number, or `None`
    /// when the budget is exhausted.
    pub fn next_attempt(&mut self) -> Option<u32> {
        if self.used >= self.max_attempts {
            return None;
        }
        self.used += 1;
        Some(self.used)
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.max_attempts
    }
}
