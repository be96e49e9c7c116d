use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use stackrun_core::executor::traits::{OutputRendererPlugin, ProgressPhase, RenderEvent};
use stackrun_core::OverallStatus;

/// Visual progress for a stack run
///
/// One overall bar counting settled units plus a spinner per running unit.
pub struct ProgressBarRendererPlugin {
    state: Mutex<ProgressState>,
    ascii_only: bool,
}

struct ProgressState {
    multi: MultiProgress,
    overall: ProgressBar,
    unit_bars: HashMap<String, ProgressBar>,
    total_levels: usize,
}

impl ProgressBarRendererPlugin {
    /// Draw to stderr.
    pub fn new(ascii_only: bool) -> Self {
        Self::with_target(ProgressDrawTarget::stderr(), ascii_only)
    }

    /// Track progress without drawing anything.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden(), true)
    }

    fn with_target(target: ProgressDrawTarget, ascii_only: bool) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let overall = multi.add(ProgressBar::new(0));

        let chars = if ascii_only { "#>-" } else { "█▓▒░  " };
        overall.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} units ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars(chars),
        );

        Self {
            state: Mutex::new(ProgressState {
                multi,
                overall,
                unit_bars: HashMap::new(),
                total_levels: 0,
            }),
            ascii_only,
        }
    }

    /// Units settled so far.
    pub fn position(&self) -> u64 {
        self.state.lock().map(|s| s.overall.position()).unwrap_or(0)
    }

    /// Units currently showing a spinner.
    pub fn active_units(&self) -> usize {
        self.state.lock().map(|s| s.unit_bars.len()).unwrap_or(0)
    }

    fn icon(&self, phase: ProgressPhase) -> &'static str {
        match (phase, self.ascii_only) {
            (ProgressPhase::Started, true) => "..",
            (ProgressPhase::Started, false) => "⏳",
            (ProgressPhase::Retrying, true) => "<>",
            (ProgressPhase::Retrying, false) => "↻",
            (ProgressPhase::Succeeded, true) => "OK",
            (ProgressPhase::Succeeded, false) => "✅",
            (ProgressPhase::Failed, true) => "XX",
            (ProgressPhase::Failed, false) => "❌",
            (ProgressPhase::Skipped, true) => "--",
            (ProgressPhase::Skipped, false) => "⏭",
        }
    }

    fn spinner(&self, state: &mut ProgressState, unit_id: &str) -> ProgressBar {
        if let Some(bar) = state.unit_bars.get(unit_id) {
            return bar.clone();
        }

        let bar = state.multi.add(ProgressBar::new_spinner());
        let ticks: &[&str] = if self.ascii_only {
            &["|", "/", "-", "\\"]
        } else {
            &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]
        };
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(ticks),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        state.unit_bars.insert(unit_id.to_string(), bar.clone());
        bar
    }
}

impl OutputRendererPlugin for ProgressBarRendererPlugin {
    fn name(&self) -> &str {
        "progress-bar-renderer"
    }

    fn format(&self) -> &str {
        "progress"
    }

    fn render(&self, event: &RenderEvent) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };

        match event {
            RenderEvent::RunStart {
                total_units,
                total_levels,
                ..
            } => {
                state.overall.set_length(*total_units as u64);
                state.total_levels = *total_levels;
                state.overall.set_message("Starting...");
            }
            RenderEvent::LevelStart { level, .. } => {
                let msg = format!("Level {}/{}", level + 1, state.total_levels);
                state.overall.set_message(msg);
            }
            RenderEvent::Progress(ev) => match ev.phase {
                ProgressPhase::Started | ProgressPhase::Retrying => {
                    let bar = self.spinner(&mut state, &ev.unit_id);
                    bar.set_message(format!(
                        "{} {} (attempt {})",
                        self.icon(ev.phase),
                        ev.unit_id,
                        ev.attempt
                    ));
                }
                ProgressPhase::Succeeded | ProgressPhase::Failed | ProgressPhase::Skipped => {
                    let mut msg = format!("{} {}", self.icon(ev.phase), ev.unit_id);
                    if let Some(detail) = ev.detail.as_deref().filter(|d| !d.is_empty()) {
                        msg.push_str(&format!(": {}", detail));
                    }
                    match state.unit_bars.remove(&ev.unit_id) {
                        Some(bar) => bar.finish_with_message(msg),
                        None => {
                            let _ = state.multi.println(format!("  {}", msg));
                        }
                    }
                    state.overall.inc(1);
                }
            },
            RenderEvent::RunEnd { report, .. } => {
                for (_, bar) in state.unit_bars.drain() {
                    bar.finish_and_clear();
                }
                let msg = match report.overall_status {
                    OverallStatus::AllSucceeded => "All units succeeded",
                    OverallStatus::PartialFailure => "Finished with failures",
                    OverallStatus::Aborted => "Aborted",
                };
                state.overall.finish_with_message(msg);
            }
            RenderEvent::Plan { .. } | RenderEvent::LevelEnd { .. } => {}
        }
    }
}

impl Drop for ProgressBarRendererPlugin {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            for (_, bar) in state.unit_bars.drain() {
                bar.finish_and_clear();
            }
        }
    }
}
