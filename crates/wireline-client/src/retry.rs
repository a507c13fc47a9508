//! Reconnect policy for connection establishment.
//!
//! The protocol's connect loop deliberately retries refused/unreachable
//! attempts until the operator's target comes up. That stays the default
//! here, but the policy is injectable so callers can bound it (for tests)
//! or add exponential backoff (the documented improvement over the
//! original's hot loop).

use std::time::Duration;

/// Exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay after the first failed attempt.
    pub initial: Duration,
    /// Ceiling for the doubled delay.
    pub max: Duration,
}

/// Policy consulted after each failed connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Backoff between attempts. `None` retries immediately.
    pub backoff: Option<Backoff>,
    /// Give up after this many failed attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::immediate()
    }
}

impl RetryPolicy {
    /// Retry immediately and forever: the original keep-trying-until-the-
    /// target-comes-up behavior.
    pub fn immediate() -> Self {
        Self { backoff: None, max_attempts: None }
    }

    /// Retry forever with exponential backoff, doubling from `initial` up to
    /// `max`.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self { backoff: Some(Backoff { initial, max }), max_attempts: None }
    }

    /// Bound the number of attempts. Mostly for tests that need the connect
    /// loop to terminate deterministically.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Delay before the next attempt, given how many have failed so far.
    /// `None` means give up.
    pub fn next_delay(&self, failed_attempts: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts
            && failed_attempts >= max
        {
            return None;
        }

        let Some(backoff) = self.backoff else {
            return Some(Duration::ZERO);
        };

        // Cap the exponent before shifting; the `min` with backoff.max below
        // makes larger exponents indistinguishable anyway.
        let exponent = failed_attempts.saturating_sub(1).min(20);
        let delay = backoff.initial.saturating_mul(1 << exponent);
        Some(delay.min(backoff.max))
    }
}
