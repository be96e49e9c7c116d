use chrono::Local;
use serde_json::{json, Value};
use stackrun_core::executor::traits::{OutputRendererPlugin, ProgressPhase, RenderEvent};

pub struct JsonlRendererPlugin {
    pretty_print: bool,
}

impl JsonlRendererPlugin {
    pub fn new(pretty_print: bool) -> Self {
        Self { pretty_print }
    }

    fn event_to_json(&self, event: &RenderEvent) -> Value {
        let ts = Local::now().to_rfc3339();
        match event {
            RenderEvent::RunStart {
                run_id,
                total_units,
                total_levels,
                dry_run,
            } => json!({
                "v": 1,
                "event_type": "run.start",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "total_units": total_units,
                    "total_levels": total_levels,
                    "dry_run": dry_run,
                }
            }),
            RenderEvent::Plan { run_id, graph } => json!({
                "v": 1,
                "event_type": "executor.plan",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "nodes": graph.nodes,
                    "edges": graph.edges,
                    "levels": graph.levels,
                }
            }),
            RenderEvent::LevelStart {
                run_id,
                level,
                unit_ids,
            } => json!({
                "v": 1,
                "event_type": "level.start",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "level": level,
                    "units": unit_ids,
                }
            }),
            RenderEvent::Progress(ev) => {
                let event_type = match ev.phase {
                    ProgressPhase::Started => "unit.start",
                    ProgressPhase::Retrying => "unit.retry",
                    ProgressPhase::Succeeded | ProgressPhase::Failed | ProgressPhase::Skipped => {
                        "unit.end"
                    }
                };
                json!({
                    "v": 1,
                    "event_type": event_type,
                    "ts": ev.timestamp.with_timezone(&Local).to_rfc3339(),
                    "run_id": ev.run_id,
                    "unit_id": ev.unit_id,
                    "metadata": {
                        "attempt": ev.attempt,
                        "status": ev.phase.as_str(),
                        "detail": ev.detail,
                    }
                })
            }
            RenderEvent::LevelEnd { run_id, level } => json!({
                "v": 1,
                "event_type": "level.end",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "level": level,
                }
            }),
            RenderEvent::RunEnd { run_id, report } => json!({
                "v": 1,
                "event_type": "run.end",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "overall_status": report.overall_status,
                    "abort_reason": report.abort_reason,
                    "succeeded": report.succeeded(),
                    "failed": report.failed(),
                    "skipped": report.skipped(),
                    "levels_completed": report.levels_completed,
                    "duration_ms": report.total_duration.as_millis() as u64,
                    "results": report.results,
                }
            }),
        }
    }
}

impl OutputRendererPlugin for JsonlRendererPlugin {
    fn name(&self) -> &str {
        "jsonl-renderer"
    }

    fn format(&self) -> &str {
        "jsonl"
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn render(&self, event: &RenderEvent) {
        let value = self.event_to_json(event);
        if self.pretty_print {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".into()));
        } else {
            println!("{}", serde_json::to_string(&value).unwrap_or_else(|_| "{}".into()));
        }
    }
}
