use std::path::PathBuf;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{get_stackrun_data_dir, LoggingConfig};

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

/// Crates whose output a bare level such as `debug` applies to.
const STACKRUN_TARGETS: &[&str] = &["stackrun_core", "stackrun_plugins"];

/// Install the global subscriber: stderr and/or a log file for this process.
///
/// `RUST_LOG` takes precedence over `logging.level` when set. Returns the log
/// file path when file output is enabled.
pub fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<Option<PathBuf>> {
    if !logging.enabled {
        return Ok(None);
    }
    if !logging.console && !logging.file {
        anyhow::bail!("logging disabled for both console and file");
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(filter_directives(&logging.level))
            .with_context(|| format!("invalid log level {:?}", logging.level))?,
    };

    let mut log_path = None;
    let file_layer = if logging.file {
        let dir = log_directory(logging);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create log dir {}", dir.display()))?;
        let file_name = log_file_name(chrono::Local::now(), std::process::id());
        log_path = Some(dir.join(&file_name));

        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
        let _ = LOG_GUARD.set(guard);
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
    } else {
        None
    };

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("install tracing subscriber")?;

    Ok(log_path)
}

/// A bare level is scoped to the stackrun crates, with everything else at
/// `warn`. Anything containing a directive is passed through untouched.
fn filter_directives(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }
    let mut directives: Vec<String> = STACKRUN_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect();
    directives.push("warn".to_string());
    directives.join(",")
}

/// Configured directory, else `~/.stackrun/logs`, else the temp dir.
fn log_directory(logging: &LoggingConfig) -> PathBuf {
    if let Some(dir) = logging
        .directory
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return PathBuf::from(dir);
    }
    get_stackrun_data_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|_| std::env::temp_dir().join("stackrun"))
}

fn log_file_name(now: chrono::DateTime<chrono::Local>, pid: u32) -> String {
    format!("stackrun_{}_{pid}.log", now.format("%Y%m%d_%H%M%S"))
}
