use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::graph::DependencyGraph;
use super::retry::UnitRun;
use super::types::{
    AbortReason, AttemptOutcome, ExecutionResult, OverallStatus, ReportMetadata,
    StackExecutionReport, UnitStatus, GRACE_PERIOD_ELAPSED,
};

/// Run-level facts the aggregator does not observe itself.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub total_duration: Duration,
    pub levels_completed: usize,
    pub execution_order: Vec<String>,
    pub abort_reason: Option<AbortReason>,
    pub dry_run: bool,
}

/// Collects exactly one final result per unit.
///
/// Slots are indexed by the graph arena; a slot is written once and later
/// writes are ignored.
#[derive(Debug)]
pub struct ResultAggregator {
    slots: Vec<Option<ExecutionResult>>,
}

impl ResultAggregator {
    pub fn new(unit_count: usize) -> Self {
        Self {
            slots: vec![None; unit_count],
        }
    }

    pub fn status(&self, idx: usize) -> Option<UnitStatus> {
        self.slots.get(idx).and_then(|s| s.as_ref()).map(|r| r.status)
    }

    pub fn get(&self, idx: usize) -> Option<&ExecutionResult> {
        self.slots.get(idx).and_then(|s| s.as_ref())
    }

    /// Store a final result. Returns false if the unit already had one.
    pub fn insert(&mut self, idx: usize, result: ExecutionResult) -> bool {
        match self.slots.get_mut(idx) {
            Some(slot @ None) => {
                *slot = Some(result);
                true
            }
            Some(Some(existing)) => {
                warn!(
                    unit_id = %existing.unit_id,
                    "ignoring second result for unit"
                );
                false
            }
            None => false,
        }
    }

    /// Fold a settled unit's attempts into its final result.
    ///
    /// A unit that did not succeed and was interrupted by cancellation is
    /// reported as skipped rather than failed.
    pub fn record_run(
        &mut self,
        idx: usize,
        unit_id: &str,
        run: UnitRun,
        interrupt: Option<AbortReason>,
    ) -> Option<&ExecutionResult> {
        let result = fold_run(unit_id, run, interrupt);
        self.insert(idx, result);
        self.get(idx)
    }

    pub fn skip(&mut self, idx: usize, unit_id: &str, detail: &str) -> bool {
        self.insert(idx, ExecutionResult::skipped(unit_id, detail))
    }

    /// Record a unit that was still running when the grace period ran out.
    pub fn abandon(&mut self, idx: usize, unit_id: &str, ran_for: Duration) -> bool {
        self.insert(
            idx,
            ExecutionResult {
                unit_id: unit_id.to_string(),
                status: UnitStatus::Failed,
                attempts_made: 1,
                total_duration: ran_for,
                detail: GRACE_PERIOD_ELAPSED.to_string(),
                data: None,
            },
        )
    }

    /// Produce the report. Units without a result are reported as skipped.
    pub fn finish(self, graph: &DependencyGraph, summary: RunSummary) -> StackExecutionReport {
        let mut slots = self.slots;
        let fallback = summary
            .abort_reason
            .map(|r| r.skip_detail())
            .unwrap_or("not scheduled");

        let mut results = Vec::with_capacity(graph.len());
        for level in graph.levels() {
            for &idx in level {
                let unit_id = graph.unit(idx).id();
                let result = slots.get_mut(idx).and_then(Option::take).unwrap_or_else(|| {
                    warn!(unit_id = %unit_id, "unit had no result, reporting as skipped");
                    ExecutionResult::skipped(unit_id, fallback)
                });
                results.push(result);
            }
        }

        let overall_status = if summary.abort_reason.is_some() {
            OverallStatus::Aborted
        } else if results.iter().all(ExecutionResult::is_success) {
            OverallStatus::AllSucceeded
        } else {
            OverallStatus::PartialFailure
        };

        StackExecutionReport {
            run_id: summary.run_id,
            overall_status,
            abort_reason: summary.abort_reason,
            results,
            levels: graph.level_ids(),
            execution_order: summary.execution_order,
            levels_completed: summary.levels_completed,
            total_duration: summary.total_duration,
            started_at: summary.started_at,
            completed_at: Utc::now(),
            metadata: ReportMetadata {
                dry_run: summary.dry_run,
                unit_count: graph.len(),
                parallel_groups: graph.levels().len(),
            },
        }
    }
}

fn fold_run(unit_id: &str, run: UnitRun, interrupt: Option<AbortReason>) -> ExecutionResult {
    let attempts_made = run.attempts.len() as u32;
    let last = run.attempts.into_iter().last();

    let (mut status, mut detail, data) = match last {
        Some(a) if a.outcome == AttemptOutcome::Success => (UnitStatus::Succeeded, a.detail, a.data),
        Some(a) => (UnitStatus::Failed, a.detail, None),
        None => (UnitStatus::Failed, "no attempt was made".to_string(), None),
    };

    if status != UnitStatus::Succeeded && run.cancelled {
        if let Some(reason) = interrupt {
            status = UnitStatus::Skipped;
            detail = reason.cancel_detail().to_string();
        }
    }

    ExecutionResult {
        unit_id: unit_id.to_string(),
        status,
        attempts_made,
        total_duration: run.duration,
        detail,
        data,
    }
}
