use std::time::Duration;

use crate::error::UnitError;

/// Retry strategy plugin
///
/// Shapes the wait between attempts. How many attempts a unit gets comes from
/// the execution policy, not from the strategy.
pub trait RetryStrategyPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Wait before retry number `retry` (1-based), given the policy's base delay.
    fn next_delay(&self, retry: u32, base: Duration) -> Duration;

    /// Terminal failures are never retried, whatever this returns.
    fn should_retry(&self, error: &UnitError) -> bool {
        error.is_transient()
    }
}
