#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stackrun_core::executor::traits::{OutputRendererPlugin, ProgressPhase, RenderEvent};
use stackrun_core::{Unit, UnitError, UnitOutput};

/// Shared observation point for a set of test units.
#[derive(Default)]
pub struct Probe {
    started: Mutex<Vec<String>>,
    dry_runs: Mutex<Vec<bool>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl Probe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn dry_runs(&self) -> Vec<bool> {
        self.dry_runs.lock().unwrap().clone()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self, unit_id: &str, dry_run: bool) {
        self.started.lock().unwrap().push(unit_id.to_string());
        self.dry_runs.lock().unwrap().push(dry_run);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

fn owned(deps: &[&str]) -> Vec<String> {
    deps.iter().map(|d| d.to_string()).collect()
}

/// Unit that sleeps for `work` (or until cancelled) and then succeeds.
pub fn timed_unit(id: &str, deps: &[&str], work: Duration, probe: &Arc<Probe>) -> Unit {
    let probe = probe.clone();
    Unit::from_fn(id, owned(deps), move |ctx| {
        let probe = probe.clone();
        async move {
            probe.enter(&ctx.unit_id, ctx.dry_run);
            let outcome = tokio::select! {
                _ = tokio::time::sleep(work) => Ok(UnitOutput::new(format!("{} applied", ctx.unit_id))),
                _ = ctx.cancel.cancelled() => Err(UnitError::Cancelled),
            };
            probe.leave();
            outcome
        }
    })
}

pub fn ok_unit(id: &str, deps: &[&str], probe: &Arc<Probe>) -> Unit {
    timed_unit(id, deps, Duration::from_millis(10), probe)
}

/// Unit that fails terminally on every attempt.
pub fn broken_unit(id: &str, deps: &[&str], probe: &Arc<Probe>) -> Unit {
    let probe = probe.clone();
    Unit::from_fn(id, owned(deps), move |ctx| {
        let probe = probe.clone();
        async move {
            probe.enter(&ctx.unit_id, ctx.dry_run);
            probe.leave();
            Err(UnitError::terminal("invalid configuration"))
        }
    })
}

/// Unit that fails transiently `failures` times, then succeeds.
pub fn flaky_unit(id: &str, deps: &[&str], failures: u32, calls: &Arc<AtomicU32>) -> Unit {
    let calls = calls.clone();
    Unit::from_fn(id, owned(deps), move |_ctx| {
        let calls = calls.clone();
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= failures {
                Err(UnitError::transient("429 Too Many Requests"))
            } else {
                Ok(UnitOutput::new("applied"))
            }
        }
    })
}

/// Renderer that keeps every event in memory.
#[derive(Default)]
pub struct RecordingRenderer {
    events: Mutex<Vec<RenderEvent>>,
}

impl RecordingRenderer {
    pub fn events(&self) -> Vec<RenderEvent> {
        self.events.lock().unwrap().clone()
    }

    /// (unit_id, attempt, phase) for every progress event.
    pub fn progress(&self) -> Vec<(String, u32, ProgressPhase)> {
        self.events()
            .into_iter()
            .filter_map(|ev| match ev {
                RenderEvent::Progress(p) => Some((p.unit_id, p.attempt, p.phase)),
                _ => None,
            })
            .collect()
    }
}

impl OutputRendererPlugin for RecordingRenderer {
    fn name(&self) -> &str {
        "recording"
    }

    fn format(&self) -> &str {
        "memory"
    }

    fn render(&self, event: &RenderEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
