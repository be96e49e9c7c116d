use std::time::Duration;

use stackrun_core::executor::traits::RetryStrategyPlugin;
use stackrun_core::executor::types::RetryConfig;

/// `base * 2^(retry - 1)`, capped at `max_delay`.
pub struct ExponentialBackoffPlugin {
    max_delay: Duration,
}

/// `base * retry`, capped at `max_delay`.
pub struct LinearRetryPlugin {
    max_delay: Duration,
}

impl ExponentialBackoffPlugin {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl LinearRetryPlugin {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryStrategyPlugin for ExponentialBackoffPlugin {
    fn name(&self) -> &str {
        "exponential-backoff"
    }

    fn next_delay(&self, retry: u32, base: Duration) -> Duration {
        let exp = 1u64 << retry.saturating_sub(1).min(30);
        scaled(base, exp).min(self.max_delay)
    }
}

impl RetryStrategyPlugin for LinearRetryPlugin {
    fn name(&self) -> &str {
        "linear"
    }

    fn next_delay(&self, retry: u32, base: Duration) -> Duration {
        scaled(base, retry.max(1) as u64).min(self.max_delay)
    }
}

fn scaled(base: Duration, factor: u64) -> Duration {
    let ms = (base.as_millis() as u64).saturating_mul(factor);
    Duration::from_millis(ms)
}
