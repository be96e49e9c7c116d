use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::UnitError;

use super::output::EventEmitter;
use super::traits::{ProgressPhase, RetryStrategyPlugin};
use super::types::{AttemptOutcome, ExecutionAttempt, ExecutionPolicy, Unit, UnitContext, UnitOutput};

/// Default strategy: every wait equals the policy's retry delay.
pub struct FixedDelay;

impl RetryStrategyPlugin for FixedDelay {
    fn name(&self) -> &str {
        "fixed"
    }

    fn next_delay(&self, _retry: u32, base: Duration) -> Duration {
        base
    }
}

/// Everything one unit did in a run.
#[derive(Debug, Clone)]
pub struct UnitRun {
    pub attempts: Vec<ExecutionAttempt>,
    /// Wall-clock from the first attempt to settlement, retry waits included.
    pub duration: Duration,
    /// Cancellation fired before the unit settled.
    pub cancelled: bool,
}

/// Bounded, sequential retry around one unit's executor.
#[derive(Clone)]
pub struct RetryController {
    max_attempts: u32,
    retry_delay: Duration,
    per_unit_timeout: Option<Duration>,
    dry_run: bool,
    strategy: Arc<dyn RetryStrategyPlugin>,
}

impl RetryController {
    pub fn new(policy: &ExecutionPolicy, strategy: Arc<dyn RetryStrategyPlugin>) -> Self {
        Self {
            max_attempts: policy.max_attempts(),
            retry_delay: policy.retry_delay,
            per_unit_timeout: policy.per_unit_timeout,
            dry_run: policy.dry_run,
            strategy,
        }
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    pub async fn run(&self, unit: &Unit, cancel: &CancellationToken, events: &EventEmitter) -> UnitRun {
        let start = Instant::now();
        let mut attempts = Vec::new();

        for attempt_number in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                break;
            }

            events.unit(unit.id(), attempt_number, ProgressPhase::Started, None);

            let ctx = UnitContext {
                run_id: events.run_id().to_string(),
                unit_id: unit.id().to_string(),
                attempt: attempt_number,
                dry_run: self.dry_run,
                cancel: cancel.clone(),
            };

            let started_at = Utc::now();
            let attempt_start = Instant::now();
            let result = self.attempt_once(unit, ctx).await;
            let duration = attempt_start.elapsed();

            let retry = match &result {
                Ok(_) => false,
                Err(err) => {
                    attempt_number < self.max_attempts
                        && !cancel.is_cancelled()
                        && err.is_transient()
                        && self.strategy.should_retry(err)
                }
            };

            let attempt = fold_attempt(unit.id(), attempt_number, result, started_at, duration);
            let phase = match attempt.outcome {
                AttemptOutcome::Success => ProgressPhase::Succeeded,
                _ if retry => ProgressPhase::Retrying,
                _ => ProgressPhase::Failed,
            };
            let detail = (attempt.outcome != AttemptOutcome::Success).then(|| attempt.detail.clone());
            events.unit(unit.id(), attempt_number, phase, detail);
            attempts.push(attempt);

            if !retry {
                break;
            }

            let delay = self.strategy.next_delay(attempt_number, self.retry_delay);
            debug!(
                unit_id = %unit.id(),
                attempt = attempt_number,
                delay_ms = delay.as_millis() as u64,
                strategy = self.strategy.name(),
                "waiting before retry"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => break,
            }
        }

        UnitRun {
            attempts,
            duration: start.elapsed(),
            cancelled: cancel.is_cancelled(),
        }
    }

    async fn attempt_once(&self, unit: &Unit, ctx: UnitContext) -> Result<UnitOutput, UnitError> {
        let fut = unit.executor().run(ctx);
        match self.per_unit_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(UnitError::Transient(format!(
                    "attempt timed out after {}ms",
                    limit.as_millis()
                ))),
            },
            None => fut.await,
        }
    }
}

fn fold_attempt(
    unit_id: &str,
    attempt_number: u32,
    result: Result<UnitOutput, UnitError>,
    started_at: chrono::DateTime<Utc>,
    duration: Duration,
) -> ExecutionAttempt {
    let (outcome, detail, data) = match result {
        Ok(output) => (AttemptOutcome::Success, output.summary, output.data),
        Err(err) => {
            let outcome = if err.is_transient() {
                AttemptOutcome::TransientFailure
            } else {
                AttemptOutcome::TerminalFailure
            };
            (outcome, err.to_string(), None)
        }
    };

    ExecutionAttempt {
        unit_id: unit_id.to_string(),
        attempt_number,
        outcome,
        started_at,
        ended_at: Utc::now(),
        duration,
        detail,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn controller(policy: ExecutionPolicy) -> RetryController {
        RetryController::new(&policy, Arc::new(FixedDelay))
    }

    fn flaky_unit(failures: u32, calls: Arc<AtomicU32>) -> Unit {
        Unit::from_fn("flaky", Vec::<String>::new(), move |_ctx| {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= failures {
                    Err(UnitError::transient(format!("rate limited ({n})")))
                } else {
                    Ok(UnitOutput::new("applied"))
                }
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let unit = flaky_unit(2, calls.clone());
        let policy = ExecutionPolicy::default()
            .with_max_retries(3)
            .with_retry_delay(Duration::from_millis(100));

        let run = controller(policy)
            .run(&unit, &CancellationToken::new(), &EventEmitter::new("run", None))
            .await;

        assert_eq!(run.attempts.len(), 3);
        assert_eq!(run.attempts[2].outcome, AttemptOutcome::Success);
        assert_eq!(run.attempts[0].outcome, AttemptOutcome::TransientFailure);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // two fixed waits of 100ms
        assert!(run.duration >= Duration::from_millis(200));
        assert!(!run.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_failure_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let unit = Unit::from_fn("bad-config", Vec::<String>::new(), move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(UnitError::terminal("invalid variable")) }
        });

        let run = controller(ExecutionPolicy::default().with_max_retries(5))
            .run(&unit, &CancellationToken::new(), &EventEmitter::new("run", None))
            .await;

        assert_eq!(run.attempts.len(), 1);
        assert_eq!(run.attempts[0].outcome, AttemptOutcome::TerminalFailure);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let unit = flaky_unit(10, calls.clone());
        let policy = ExecutionPolicy::default()
            .with_max_retries(2)
            .with_retry_delay(Duration::from_millis(10));

        let run = controller(policy)
            .run(&unit, &CancellationToken::new(), &EventEmitter::new("run", None))
            .await;

        assert_eq!(run.attempts.len(), 3);
        assert!(run
            .attempts
            .iter()
            .all(|a| a.outcome == AttemptOutcome::TransientFailure));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_single_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let unit = flaky_unit(1, calls.clone());

        let run = controller(ExecutionPolicy::default().with_max_retries(0))
            .run(&unit, &CancellationToken::new(), &EventEmitter::new("run", None))
            .await;

        assert_eq!(run.attempts.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn per_unit_timeout_is_transient() {
        let unit = Unit::from_fn("slow", Vec::<String>::new(), |ctx| async move {
            if ctx.attempt == 1 {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(UnitOutput::new("done"))
        });
        let policy = ExecutionPolicy::default()
            .with_max_retries(1)
            .with_retry_delay(Duration::from_millis(1))
            .with_per_unit_timeout(Duration::from_secs(1));

        let run = controller(policy)
            .run(&unit, &CancellationToken::new(), &EventEmitter::new("run", None))
            .await;

        assert_eq!(run.attempts.len(), 2);
        assert_eq!(run.attempts[0].outcome, AttemptOutcome::TransientFailure);
        assert!(run.attempts[0].detail.contains("timed out"));
        assert_eq!(run.attempts[1].outcome, AttemptOutcome::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_retry_wait() {
        let calls = Arc::new(AtomicU32::new(0));
        let unit = flaky_unit(10, calls.clone());
        let policy = ExecutionPolicy::default()
            .with_max_retries(5)
            .with_retry_delay(Duration::from_secs(30));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let run = controller(policy)
            .run(&unit, &cancel, &EventEmitter::new("run", None))
            .await;

        assert_eq!(run.attempts.len(), 1);
        assert!(run.cancelled);
        assert!(run.duration < Duration::from_secs(30));
    }
}
