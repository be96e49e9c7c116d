use std::time::Duration;

use crate::error::ExecutorError;

/// Immutable scheduling policy threaded through one stack run.
///
/// ```ignore
/// let policy = ExecutionPolicy::default()
///     .with_max_parallel_units(4)
///     .with_continue_on_error(true)
///     .with_per_unit_timeout(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPolicy {
    /// Ceiling on concurrently running units within a level.
    pub max_parallel_units: usize,
    /// Wall-clock budget for the whole run.
    pub stack_timeout: Duration,
    /// Budget for each individual attempt.
    pub per_unit_timeout: Option<Duration>,
    /// Extra attempts after the first one for transient failures.
    pub max_retries: u32,
    /// Base wait between attempts, shaped by the retry strategy.
    pub retry_delay: Duration,
    /// Keep running units that do not depend on a failed unit.
    pub continue_on_error: bool,
    /// Handed to executors; scheduling is identical either way.
    pub dry_run: bool,
    /// How long cancelled units may take to wind down.
    pub cancel_grace: Duration,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self {
            max_parallel_units: 10,
            stack_timeout: Duration::from_secs(3600),
            per_unit_timeout: None,
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            continue_on_error: false,
            dry_run: false,
            cancel_grace: Duration::from_secs(5),
        }
    }
}

impl ExecutionPolicy {
    pub fn with_max_parallel_units(mut self, max_parallel_units: usize) -> Self {
        self.max_parallel_units = max_parallel_units;
        self
    }

    pub fn with_stack_timeout(mut self, stack_timeout: Duration) -> Self {
        self.stack_timeout = stack_timeout;
        self
    }

    pub fn with_per_unit_timeout(mut self, per_unit_timeout: Duration) -> Self {
        self.per_unit_timeout = Some(per_unit_timeout);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_cancel_grace(mut self, cancel_grace: Duration) -> Self {
        self.cancel_grace = cancel_grace;
        self
    }

    /// Total attempts a unit may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn validate(&self) -> Result<(), ExecutorError> {
        if self.max_parallel_units == 0 {
            return Err(ExecutorError::InvalidPolicy(
                "max_parallel_units must be at least 1".to_string(),
            ));
        }
        if self.stack_timeout.is_zero() {
            return Err(ExecutorError::InvalidPolicy(
                "stack_timeout must be greater than zero".to_string(),
            ));
        }
        if self.per_unit_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ExecutorError::InvalidPolicy(
                "per_unit_timeout must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let policy = ExecutionPolicy::default();
        assert!(policy.validate().is_ok());
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn rejects_zero_parallelism() {
        let policy = ExecutionPolicy::default().with_max_parallel_units(0);
        assert!(matches!(
            policy.validate(),
            Err(ExecutorError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn rejects_zero_timeouts() {
        assert!(ExecutionPolicy::default()
            .with_stack_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(ExecutionPolicy::default()
            .with_per_unit_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }
}
