use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::ExecutorError;

use super::aggregate::{ResultAggregator, RunSummary};
use super::graph::DependencyGraph;
use super::output::EventEmitter;
use super::retry::{FixedDelay, RetryController};
use super::scheduler::{execute_level, LevelLimits};
use super::traits::{OutputRendererPlugin, ProgressPhase, RenderEvent, RetryStrategyPlugin};
use super::types::{
    AbortReason, ExecutionPolicy, StackExecutionReport, Unit, UnitStatus, GRACE_PERIOD_ELAPSED,
    UPSTREAM_FAILURE,
};

/// Stand-in deadline offset for timeouts that overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Execution engine for unit dependency graphs
pub struct ExecutionEngine {
    policy: ExecutionPolicy,
    renderer: Option<Arc<dyn OutputRendererPlugin>>,
    retry_strategy: Arc<dyn RetryStrategyPlugin>,
}

pub struct ExecutionEngineBuilder {
    policy: ExecutionPolicy,
    renderer: Option<Arc<dyn OutputRendererPlugin>>,
    retry_strategy: Option<Arc<dyn RetryStrategyPlugin>>,
}

impl ExecutionEngine {
    /// Engine with the default fixed-delay retry and `tracing` output.
    pub fn new(policy: ExecutionPolicy) -> Result<Self, ExecutorError> {
        Self::builder(policy).build()
    }

    pub fn builder(policy: ExecutionPolicy) -> ExecutionEngineBuilder {
        ExecutionEngineBuilder::new(policy)
    }

    pub fn policy(&self) -> &ExecutionPolicy {
        &self.policy
    }

    /// Build the graph from `units` and run it to completion.
    pub async fn execute(&self, units: Vec<Unit>) -> Result<StackExecutionReport, ExecutorError> {
        self.execute_with_cancel(units, CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute), stoppable through `cancel`.
    ///
    /// Cancelling the token winds the run down and returns
    /// [`ExecutorError::Cancelled`] carrying the complete report.
    pub async fn execute_with_cancel(
        &self,
        units: Vec<Unit>,
        cancel: CancellationToken,
    ) -> Result<StackExecutionReport, ExecutorError> {
        let graph = DependencyGraph::from_units(units)?;
        self.execute_graph(&graph, cancel).await
    }

    /// Run an already validated graph.
    pub async fn execute_graph(
        &self,
        graph: &DependencyGraph,
        cancel: CancellationToken,
    ) -> Result<StackExecutionReport, ExecutorError> {
        let run_id = new_run_id();
        let span = info_span!("stack_run", run_id = %run_id);

        let report = self
            .run_levels(graph, &run_id, &cancel)
            .instrument(span)
            .await;

        if report.abort_reason == Some(AbortReason::Cancelled) {
            return Err(ExecutorError::Cancelled {
                report: Box::new(report),
            });
        }
        Ok(report)
    }

    /// Drive every level in order; the only place results are written.
    async fn run_levels(
        &self,
        graph: &DependencyGraph,
        run_id: &str,
        cancel: &CancellationToken,
    ) -> StackExecutionReport {
        let events = EventEmitter::new(run_id, self.renderer.clone());
        let controller = RetryController::new(&self.policy, self.retry_strategy.clone());
        let run_token = cancel.child_token();

        let started_at = Utc::now();
        let start = Instant::now();
        let limits = LevelLimits {
            max_parallel: self.policy.max_parallel_units,
            deadline: run_deadline(start, self.policy.stack_timeout),
            cancel_grace: self.policy.cancel_grace,
        };

        let mut results = ResultAggregator::new(graph.len());
        let mut blocked = vec![false; graph.len()];
        let mut halted = false;
        let mut abort_reason: Option<AbortReason> = None;
        let mut levels_completed = 0;
        let mut execution_order = Vec::with_capacity(graph.len());

        debug!(
            units = graph.len(),
            levels = graph.levels().len(),
            max_parallel = self.policy.max_parallel_units,
            retry_strategy = controller.strategy_name(),
            "planning stack run"
        );
        events.emit(RenderEvent::RunStart {
            run_id: run_id.to_string(),
            total_units: graph.len(),
            total_levels: graph.levels().len(),
            dry_run: self.policy.dry_run,
        });
        events.emit(RenderEvent::Plan {
            run_id: run_id.to_string(),
            graph: graph.snapshot(),
        });

        for (level, members) in graph.levels().iter().enumerate() {
            if let Some(reason) = abort_reason {
                skip_all(&mut results, &events, graph, members, reason.skip_detail());
                continue;
            }
            if halted {
                skip_all(&mut results, &events, graph, members, UPSTREAM_FAILURE);
                continue;
            }

            events.emit(RenderEvent::LevelStart {
                run_id: run_id.to_string(),
                level,
                unit_ids: members
                    .iter()
                    .map(|&idx| graph.unit(idx).id().to_string())
                    .collect(),
            });

            let mut runnable = Vec::with_capacity(members.len());
            for &idx in members {
                if blocked[idx] {
                    skip_unit(&mut results, &events, graph, idx, UPSTREAM_FAILURE);
                } else {
                    runnable.push(idx);
                }
            }

            let (controller, token, emitter) = (&controller, &run_token, &events);
            let outcome = execute_level(&runnable, limits, cancel, token, move |idx| {
                controller.run(graph.unit(idx), token, emitter)
            })
            .await;

            execution_order.extend(
                outcome
                    .started
                    .iter()
                    .map(|&idx| graph.unit(idx).id().to_string()),
            );

            let interrupt = outcome.interrupt.or_else(|| {
                cancel
                    .is_cancelled()
                    .then_some(AbortReason::Cancelled)
            });
            for (idx, run) in outcome.settled {
                let unit_id = graph.unit(idx).id();
                if let Some(result) = results.record_run(idx, unit_id, run, interrupt) {
                    if result.status == UnitStatus::Skipped {
                        events.unit(
                            unit_id,
                            result.attempts_made,
                            ProgressPhase::Skipped,
                            Some(result.detail.clone()),
                        );
                    }
                }
            }

            if let Some(reason) = interrupt {
                for idx in outcome.not_started {
                    skip_unit(&mut results, &events, graph, idx, reason.skip_detail());
                }
                for (idx, ran_for) in outcome.abandoned {
                    let unit_id = graph.unit(idx).id();
                    if results.abandon(idx, unit_id, ran_for) {
                        events.unit(
                            unit_id,
                            1,
                            ProgressPhase::Failed,
                            Some(GRACE_PERIOD_ELAPSED.to_string()),
                        );
                    }
                }
                warn!(level, reason = ?reason, "stack run interrupted");
                abort_reason = Some(reason);
                events.emit(RenderEvent::LevelEnd {
                    run_id: run_id.to_string(),
                    level,
                });
                continue;
            }

            for &idx in &runnable {
                if results.status(idx) != Some(UnitStatus::Failed) {
                    continue;
                }
                if self.policy.continue_on_error {
                    for dependent in graph.transitive_dependents(idx) {
                        blocked[dependent] = true;
                    }
                } else {
                    halted = true;
                }
            }
            if halted {
                info!(level, "unit failed, skipping remaining levels");
            }

            levels_completed += 1;
            events.emit(RenderEvent::LevelEnd {
                run_id: run_id.to_string(),
                level,
            });
        }

        let report = results.finish(
            graph,
            RunSummary {
                run_id: run_id.to_string(),
                started_at,
                total_duration: start.elapsed(),
                levels_completed,
                execution_order,
                abort_reason,
                dry_run: self.policy.dry_run,
            },
        );

        events.emit(RenderEvent::RunEnd {
            run_id: run_id.to_string(),
            report: report.clone(),
        });

        report
    }
}

impl ExecutionEngineBuilder {
    pub fn new(policy: ExecutionPolicy) -> Self {
        Self {
            policy,
            renderer: None,
            retry_strategy: None,
        }
    }

    pub fn renderer(mut self, renderer: Arc<dyn OutputRendererPlugin>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn retry_strategy(mut self, strategy: Arc<dyn RetryStrategyPlugin>) -> Self {
        self.retry_strategy = Some(strategy);
        self
    }

    /// Validate the policy and assemble the engine.
    pub fn build(self) -> Result<ExecutionEngine, ExecutorError> {
        self.policy.validate()?;
        Ok(ExecutionEngine {
            policy: self.policy,
            renderer: self.renderer,
            retry_strategy: self.retry_strategy.unwrap_or_else(|| Arc::new(FixedDelay)),
        })
    }
}

/// Convenience wrapper: default plugins, no external cancellation.
pub async fn execute_units(
    units: Vec<Unit>,
    policy: ExecutionPolicy,
) -> Result<StackExecutionReport, ExecutorError> {
    ExecutionEngine::new(policy)?.execute(units).await
}

/// Deadline for the whole run. Timeouts too large to represent never fire.
fn run_deadline(start: Instant, stack_timeout: Duration) -> Instant {
    start
        .checked_add(stack_timeout)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

/// `stack_exec_<local timestamp>_<8 hex>`
fn new_run_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "stack_exec_{}_{}",
        Local::now().format("%Y%m%d_%H%M%S"),
        &suffix[..8]
    )
}

fn skip_unit(
    results: &mut ResultAggregator,
    events: &EventEmitter,
    graph: &DependencyGraph,
    idx: usize,
    detail: &str,
) {
    let unit_id = graph.unit(idx).id();
    if results.skip(idx, unit_id, detail) {
        events.unit(unit_id, 0, ProgressPhase::Skipped, Some(detail.to_string()));
    }
}

fn skip_all(
    results: &mut ResultAggregator,
    events: &EventEmitter,
    graph: &DependencyGraph,
    members: &[usize],
    detail: &str,
) {
    for &idx in members {
        skip_unit(results, events, graph, idx, detail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnitError;
    use crate::executor::types::{OverallStatus, UnitOutput};
    use std::time::Duration;

    fn ok_unit(id: &str, deps: &[&str]) -> Unit {
        let deps: Vec<String> = deps.iter().map(|d| d.to_string()).collect();
        Unit::from_fn(id, deps, |ctx| async move {
            Ok(UnitOutput::new(format!("{} applied", ctx.unit_id)))
        })
    }

    fn failing_unit(id: &str, deps: &[&str]) -> Unit {
        let deps: Vec<String> = deps.iter().map(|d| d.to_string()).collect();
        Unit::from_fn(id, deps, |_ctx| async { Err(UnitError::terminal("invalid input")) })
    }

    #[test]
    fn run_id_format() {
        let id = new_run_id();
        assert!(id.starts_with("stack_exec_"));
        // stack_exec_ + YYYYmmdd_HHMMSS + _ + 8 hex
        assert_eq!(id.len(), "stack_exec_".len() + 15 + 1 + 8);
    }

    #[test]
    fn builder_rejects_invalid_policy() {
        let policy = ExecutionPolicy::default().with_max_parallel_units(0);
        assert!(matches!(
            ExecutionEngine::builder(policy).build(),
            Err(ExecutorError::InvalidPolicy(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_stack_succeeds() {
        let report = execute_units(Vec::new(), ExecutionPolicy::default())
            .await
            .unwrap();
        assert_eq!(report.overall_status, OverallStatus::AllSucceeded);
        assert!(report.results.is_empty());
        assert_eq!(report.levels_completed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fail_fast_skips_later_levels() {
        let units = vec![
            failing_unit("a", &[]),
            ok_unit("b", &[]),
            ok_unit("c", &["b"]),
        ];
        let report = execute_units(units, ExecutionPolicy::default()).await.unwrap();

        assert_eq!(report.status_of("a"), Some(UnitStatus::Failed));
        assert_eq!(report.status_of("b"), Some(UnitStatus::Succeeded));
        assert_eq!(report.status_of("c"), Some(UnitStatus::Skipped));
        assert_eq!(report.result("c").unwrap().detail, UPSTREAM_FAILURE);
        assert_eq!(report.levels_completed, 1);
        assert_eq!(report.execution_order, vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stack_timeout_aborts() {
        let slow = Unit::from_fn("slow", Vec::<String>::new(), |ctx| async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(10)) => Ok(UnitOutput::new("done")),
                _ = ctx.cancel.cancelled() => Err(UnitError::Cancelled),
            }
        });
        let units = vec![slow, ok_unit("after", &["slow"])];
        let policy = ExecutionPolicy::default().with_stack_timeout(Duration::from_secs(1));

        let report = execute_units(units, policy).await.unwrap();

        assert_eq!(report.overall_status, OverallStatus::Aborted);
        assert_eq!(report.abort_reason, Some(AbortReason::StackTimeout));
        assert_eq!(report.result("slow").unwrap().detail, "cancelled: stack timeout");
        assert_eq!(report.result("after").unwrap().detail, "stack timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_stack_timeout_runs_normally() {
        let policy = ExecutionPolicy::default().with_stack_timeout(Duration::from_secs(u64::MAX));
        let report = execute_units(vec![ok_unit("a", &[]), ok_unit("b", &["a"])], policy)
            .await
            .unwrap();

        assert_eq!(report.overall_status, OverallStatus::AllSucceeded);
        assert_eq!(report.levels_completed, 2);
    }

    #[test]
    fn overflowing_deadline_falls_back() {
        let start = Instant::now();
        assert_eq!(run_deadline(start, Duration::MAX), start + FAR_FUTURE);
        assert_eq!(
            run_deadline(start, Duration::from_secs(5)),
            start + Duration::from_secs(5)
        );
    }
}
