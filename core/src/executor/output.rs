use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::traits::{OutputRendererPlugin, ProgressEvent, ProgressPhase, RenderEvent};

/// Routes run events to the configured renderer, or to `tracing` when none
/// is configured.
#[derive(Clone)]
pub struct EventEmitter {
    run_id: String,
    renderer: Option<Arc<dyn OutputRendererPlugin>>,
}

impl EventEmitter {
    pub fn new(run_id: impl Into<String>, renderer: Option<Arc<dyn OutputRendererPlugin>>) -> Self {
        Self {
            run_id: run_id.into(),
            renderer,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn emit(&self, event: RenderEvent) {
        match &self.renderer {
            Some(renderer) => renderer.render(&event),
            None => log_event(&event),
        }
    }

    pub fn unit(&self, unit_id: &str, attempt: u32, phase: ProgressPhase, detail: Option<String>) {
        self.emit(RenderEvent::Progress(ProgressEvent {
            run_id: self.run_id.clone(),
            unit_id: unit_id.to_string(),
            attempt,
            phase,
            timestamp: Utc::now(),
            detail,
        }));
    }
}

fn log_event(event: &RenderEvent) {
    match event {
        RenderEvent::RunStart {
            run_id,
            total_units,
            total_levels,
            dry_run,
        } => info!(
            run_id = %run_id,
            total_units,
            total_levels,
            dry_run,
            "stack run started"
        ),
        RenderEvent::Plan { run_id, graph } => {
            for (level, ids) in graph.levels.iter().enumerate() {
                debug!(run_id = %run_id, level, units = %ids.join(", "), "execution plan");
            }
        }
        RenderEvent::LevelStart {
            run_id,
            level,
            unit_ids,
        } => info!(run_id = %run_id, level, units = unit_ids.len(), "level started"),
        RenderEvent::Progress(ev) => log_progress(ev),
        RenderEvent::LevelEnd { run_id, level } => debug!(run_id = %run_id, level, "level settled"),
        RenderEvent::RunEnd { run_id, report } => info!(
            run_id = %run_id,
            status = ?report.overall_status,
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped(),
            duration_ms = report.total_duration.as_millis() as u64,
            "stack run finished"
        ),
    }
}

fn log_progress(ev: &ProgressEvent) {
    let detail = ev.detail.as_deref().unwrap_or("");
    match ev.phase {
        ProgressPhase::Started => {
            debug!(run_id = %ev.run_id, unit_id = %ev.unit_id, attempt = ev.attempt, "unit started")
        }
        ProgressPhase::Succeeded => {
            info!(run_id = %ev.run_id, unit_id = %ev.unit_id, attempt = ev.attempt, "unit succeeded")
        }
        ProgressPhase::Retrying => warn!(
            run_id = %ev.run_id,
            unit_id = %ev.unit_id,
            attempt = ev.attempt,
            detail,
            "unit attempt failed, retrying"
        ),
        ProgressPhase::Failed => warn!(
            run_id = %ev.run_id,
            unit_id = %ev.unit_id,
            attempt = ev.attempt,
            detail,
            "unit failed"
        ),
        ProgressPhase::Skipped => {
            info!(run_id = %ev.run_id, unit_id = %ev.unit_id, detail, "unit skipped")
        }
    }
}
