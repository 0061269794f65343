//! Retry policy and backoff clock for control-plane calls.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

/// Exponential backoff: the wait after attempt `k` is `base_delay * 2^(k-1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Add up to 50% random extra delay to each wait.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given (1-based) failed attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);

        if !self.jitter || delay.is_zero() {
            return delay;
        }

        let max_extra = (delay.as_millis() / 2) as u64;
        let extra = rand::rng().random_range(0..=max_extra);
        delay + Duration::from_millis(extra)
    }
}

/// Clock used between attempts. Tests swap in an implementation that records instead of waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
