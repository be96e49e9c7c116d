use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::retry::UnitRun;
use super::types::AbortReason;

/// What happened to the units of one level.
#[derive(Debug, Default)]
pub struct LevelOutcome {
    /// Units in the order they were launched.
    pub started: Vec<usize>,
    /// Units that produced a final outcome, in completion order.
    pub settled: Vec<(usize, UnitRun)>,
    /// Queued units that never launched because the run was interrupted.
    pub not_started: Vec<usize>,
    /// Units still running when the grace period ran out, with their runtime.
    pub abandoned: Vec<(usize, Duration)>,
    pub interrupt: Option<AbortReason>,
}

/// Limits for one level's worker pool.
#[derive(Debug, Clone, Copy)]
pub struct LevelLimits {
    pub max_parallel: usize,
    pub deadline: Instant,
    pub cancel_grace: Duration,
}

/// Execute a single level as a bounded worker pool
///
/// At most `max_parallel` units are in flight; whenever one settles the next
/// queued unit (in the given order) is launched. The pool stops launching
/// when the caller cancels or the run deadline passes, signals `run_token`,
/// and waits up to `cancel_grace` for in-flight units before dropping them.
///
/// # Arguments
///
/// * `runnable` - Arena indices to run, in discovery order
/// * `limits` - Concurrency ceiling, run deadline and grace period
/// * `caller` - Caller cancellation
/// * `run_token` - Token observed by executors; cancelled on interrupt
/// * `run_unit` - Runs one unit to settlement (all retries included)
pub async fn execute_level<F, Fut>(
    runnable: &[usize],
    limits: LevelLimits,
    caller: &CancellationToken,
    run_token: &CancellationToken,
    run_unit: F,
) -> LevelOutcome
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = UnitRun>,
{
    let limit = limits.max_parallel.max(1);
    let mut queue: VecDeque<usize> = runnable.iter().copied().collect();
    let mut in_flight = FuturesUnordered::new();
    let mut running: Vec<(usize, Instant)> = Vec::new();
    let mut outcome = LevelOutcome::default();

    loop {
        // Executors see the caller's cancel through `run_token` and may settle
        // before the select observes it; the cancel still wins.
        if caller.is_cancelled() {
            outcome.interrupt = Some(AbortReason::Cancelled);
            break;
        }
        if queue.is_empty() && in_flight.is_empty() {
            break;
        }
        if Instant::now() >= limits.deadline {
            outcome.interrupt = Some(AbortReason::StackTimeout);
            break;
        }

        while in_flight.len() < limit {
            let Some(idx) = queue.pop_front() else {
                break;
            };
            outcome.started.push(idx);
            running.push((idx, Instant::now()));
            let fut = run_unit(idx);
            in_flight.push(async move { (idx, fut.await) });
        }

        tokio::select! {
            biased;
            Some((idx, run)) = in_flight.next() => {
                running.retain(|(r, _)| *r != idx);
                outcome.settled.push((idx, run));
            }
            _ = caller.cancelled() => {
                outcome.interrupt = Some(AbortReason::Cancelled);
                break;
            }
            _ = tokio::time::sleep_until(limits.deadline) => {
                outcome.interrupt = Some(AbortReason::StackTimeout);
                break;
            }
        }
    }

    if outcome.interrupt.is_none() {
        return outcome;
    }

    run_token.cancel();
    outcome.not_started = queue.into_iter().collect();

    let grace = tokio::time::sleep(limits.cancel_grace);
    tokio::pin!(grace);
    while !in_flight.is_empty() {
        tokio::select! {
            biased;
            Some((idx, run)) = in_flight.next() => {
                running.retain(|(r, _)| *r != idx);
                outcome.settled.push((idx, run));
            }
            _ = &mut grace => break,
        }
    }

    if !running.is_empty() {
        warn!(
            units = running.len(),
            grace_ms = limits.cancel_grace.as_millis() as u64,
            "dropping units that ignored cancellation"
        );
    }
    outcome.abandoned = running
        .into_iter()
        .map(|(idx, started)| (idx, started.elapsed()))
        .collect();

    outcome
}
