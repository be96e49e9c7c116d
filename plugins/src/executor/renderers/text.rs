use stackrun_core::executor::traits::{OutputRendererPlugin, ProgressPhase, RenderEvent};
use stackrun_core::OverallStatus;

pub struct TextRendererPlugin {
    ascii_only: bool,
}

impl TextRendererPlugin {
    pub fn new(ascii_only: bool) -> Self {
        Self { ascii_only }
    }

    fn phase_label(&self, phase: ProgressPhase) -> &'static str {
        match (phase, self.ascii_only) {
            (ProgressPhase::Started, _) => "START",
            (ProgressPhase::Retrying, _) => "RETRY",
            (ProgressPhase::Succeeded, true) => "OK",
            (ProgressPhase::Succeeded, false) => "SUCCESS",
            (ProgressPhase::Failed, true) => "FAIL",
            (ProgressPhase::Failed, false) => "FAILED",
            (ProgressPhase::Skipped, _) => "SKIP",
        }
    }

    fn format_event(&self, event: &RenderEvent) -> String {
        match event {
            RenderEvent::RunStart {
                run_id,
                total_units,
                total_levels,
                dry_run,
            } => {
                let mut line = format!(
                    "RUN START {} (units: {}, levels: {})",
                    run_id, total_units, total_levels
                );
                if *dry_run {
                    line.push_str(" [dry-run]");
                }
                line
            }
            RenderEvent::Plan { run_id, graph } => {
                let mut out = format!("PLAN {}:", run_id);
                for (idx, level) in graph.levels.iter().enumerate() {
                    out.push_str(&format!("\n  level {}: {}", idx, level.join(", ")));
                }
                out
            }
            RenderEvent::LevelStart {
                run_id,
                level,
                unit_ids,
            } => format!(
                "LEVEL START {} (level {}, units: {})",
                run_id,
                level,
                unit_ids.len()
            ),
            RenderEvent::Progress(ev) => {
                let mut line = format!(
                    "UNIT {} {} (attempt {})",
                    self.phase_label(ev.phase),
                    ev.unit_id,
                    ev.attempt
                );
                if let Some(detail) = ev.detail.as_deref().filter(|d| !d.is_empty()) {
                    line.push_str(&format!(": {}", detail));
                }
                line
            }
            RenderEvent::LevelEnd { run_id, level } => {
                format!("LEVEL END {} (level {})", run_id, level)
            }
            RenderEvent::RunEnd { run_id, report } => {
                let status = match report.overall_status {
                    OverallStatus::AllSucceeded => "all succeeded",
                    OverallStatus::PartialFailure => "partial failure",
                    OverallStatus::Aborted => "aborted",
                };
                format!(
                    "RUN END {} ({}, succeeded {}, failed {}, skipped {}, duration {}ms)",
                    run_id,
                    status,
                    report.succeeded(),
                    report.failed(),
                    report.skipped(),
                    report.total_duration.as_millis()
                )
            }
        }
    }
}

impl OutputRendererPlugin for TextRendererPlugin {
    fn name(&self) -> &str {
        "text-renderer"
    }

    fn format(&self) -> &str {
        "text"
    }

    fn render(&self, event: &RenderEvent) {
        println!("{}", self.format_event(event));
    }
}
