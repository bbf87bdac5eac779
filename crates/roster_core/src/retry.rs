use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff applied to rate-limited requests.
///
/// `delay(attempt) = min(base_delay_ms * 2^attempt, max_delay_ms)`, with
/// `attempt` counted from zero for the first retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Policy for calls a user is waiting on.
    pub const fn user_facing() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 8_000,
        }
    }

    /// Policy for unattended status polling.
    pub const fn background() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 1_000,
            max_delay_ms: 4_000,
        }
    }

    /// A request is always issued at least once.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let millis = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(millis)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::user_facing()
    }
}
