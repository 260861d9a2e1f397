//! Bounded retry and readiness budgets.
//!
//! Every wait in loadfleet is bounded by one of these. Tests build them with
//! zero delays so no test sleeps.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed-delay retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Connection attempts per host: 3, five seconds apart.
    pub const CONNECT: Self = Self {
        max_attempts: 3,
        delay: Duration::from_secs(5),
    };

    /// Attempts per transfer item: 4 (one plus three retries), three seconds apart.
    pub const TRANSFER: Self = Self {
        max_attempts: 4,
        delay: Duration::from_secs(3),
    };

    /// Policy with `max_attempts` and no delay.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
        }
    }

    /// Whether another attempt is allowed after `attempts_made`.
    pub fn allows_another(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts.max(1)
    }
}

/// Readiness polling budget for a batch of fresh instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessPolicy {
    /// Wait before the first poll.
    pub warmup: Duration,
    /// Pause between polls.
    pub interval: Duration,
    /// Attempts every batch gets regardless of size.
    pub base_attempts: u32,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            warmup: Duration::from_secs(30),
            interval: Duration::from_secs(10),
            base_attempts: 3,
        }
    }
}

impl ReadinessPolicy {
    /// Policy with `base_attempts` and no waiting.
    pub fn immediate(base_attempts: u32) -> Self {
        Self {
            warmup: Duration::ZERO,
            interval: Duration::ZERO,
            base_attempts,
        }
    }

    /// Poll budget for a batch of `size` instances: larger batches get longer.
    pub fn attempts_for(&self, size: usize) -> u32 {
        self.base_attempts
            .saturating_add(u32::try_from(size).unwrap_or(u32::MAX))
    }
}
