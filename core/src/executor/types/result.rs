use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Detail recorded for units skipped because a dependency failed.
pub const UPSTREAM_FAILURE: &str = "upstream failure";

/// Detail recorded for units dropped after the cancellation grace period.
pub const GRACE_PERIOD_ELAPSED: &str = "cancelled: grace period elapsed";

/// Classification of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    TransientFailure,
    TerminalFailure,
}

/// One try of one unit.
#[derive(Debug, Clone)]
pub struct ExecutionAttempt {
    pub unit_id: String,
    /// 1-based.
    pub attempt_number: u32,
    pub outcome: AttemptOutcome,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration: Duration,
    pub detail: String,
    pub data: Option<serde_json::Value>,
}

/// Final fate of a unit in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Result of executing a single unit
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub unit_id: String,
    pub status: UnitStatus,
    /// Zero for units that never started.
    pub attempts_made: u32,
    #[serde(rename = "total_duration_ms", serialize_with = "serialize_millis")]
    pub total_duration: Duration,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ExecutionResult {
    pub fn skipped(unit_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            status: UnitStatus::Skipped,
            attempts_made: 0,
            total_duration: Duration::ZERO,
            detail: detail.into(),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == UnitStatus::Succeeded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    AllSucceeded,
    PartialFailure,
    Aborted,
}

/// Why a run stopped before every unit reached a final state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    StackTimeout,
    Cancelled,
}

impl AbortReason {
    /// Detail for units that never started.
    pub fn skip_detail(&self) -> &'static str {
        match self {
            Self::StackTimeout => "stack timeout",
            Self::Cancelled => "caller cancelled",
        }
    }

    /// Detail for in-flight units that wound down after cancellation.
    pub fn cancel_detail(&self) -> &'static str {
        match self {
            Self::StackTimeout => "cancelled: stack timeout",
            Self::Cancelled => "cancelled: caller request",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub dry_run: bool,
    pub unit_count: usize,
    pub parallel_groups: usize,
}

/// Result of executing a stack
#[derive(Debug, Clone, Serialize)]
pub struct StackExecutionReport {
    pub run_id: String,
    pub overall_status: OverallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<AbortReason>,
    /// One entry per unit of the graph, ordered by level then discovery order.
    pub results: Vec<ExecutionResult>,
    /// Execution plan (unit ids per level).
    pub levels: Vec<Vec<String>>,
    /// Order in which units actually started.
    pub execution_order: Vec<String>,
    pub levels_completed: usize,
    #[serde(rename = "total_duration_ms", serialize_with = "serialize_millis")]
    pub total_duration: Duration,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub metadata: ReportMetadata,
}

impl StackExecutionReport {
    pub fn result(&self, unit_id: &str) -> Option<&ExecutionResult> {
        self.results.iter().find(|r| r.unit_id == unit_id)
    }

    pub fn status_of(&self, unit_id: &str) -> Option<UnitStatus> {
        self.result(unit_id).map(|r| r.status)
    }

    pub fn succeeded(&self) -> usize {
        self.count(UnitStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(UnitStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(UnitStatus::Skipped)
    }

    fn count(&self, status: UnitStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}
