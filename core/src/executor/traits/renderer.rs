use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::executor::graph::GraphSnapshot;
use crate::executor::types::StackExecutionReport;

/// Output renderer plugin (receives every progress event of a run)
pub trait OutputRendererPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn format(&self) -> &str;
    fn supports_streaming(&self) -> bool {
        false
    }
    fn render(&self, event: &RenderEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    Started,
    Retrying,
    Succeeded,
    Failed,
    Skipped,
}

impl ProgressPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Per-unit progress notification.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub run_id: String,
    pub unit_id: String,
    /// Zero for units skipped without an attempt.
    pub attempt: u32,
    pub phase: ProgressPhase,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Render event (unified event type)
#[derive(Debug, Clone)]
pub enum RenderEvent {
    RunStart {
        run_id: String,
        total_units: usize,
        total_levels: usize,
        dry_run: bool,
    },
    Plan {
        run_id: String,
        graph: GraphSnapshot,
    },
    LevelStart {
        run_id: String,
        level: usize,
        unit_ids: Vec<String>,
    },
    Progress(ProgressEvent),
    LevelEnd {
        run_id: String,
        level: usize,
    },
    RunEnd {
        run_id: String,
        report: StackExecutionReport,
    },
}
