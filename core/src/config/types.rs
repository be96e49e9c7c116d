use serde::{Deserialize, Serialize};

use crate::executor::types::ExecutorConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or `~/.stackrun/logs` if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "stackrun_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses `~/.stackrun/logs`.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert!(cfg.logging.enabled);
        assert!(cfg.logging.console);
        assert!(!cfg.logging.file);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.executor.max_parallel_units, 10);
    }

    #[test]
    fn sections_parse_independently() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [logging]
            level = "stackrun_core=debug"
            file = true
            directory = "/var/log/stackrun"

            [executor]
            max_parallel_units = 4
            continue_on_error = true
            "#,
        )
        .unwrap();

        assert_eq!(cfg.logging.level, "stackrun_core=debug");
        assert!(cfg.logging.file);
        assert_eq!(cfg.logging.directory.as_deref(), Some("/var/log/stackrun"));
        assert_eq!(cfg.executor.max_parallel_units, 4);
        assert!(cfg.executor.continue_on_error);
        assert_eq!(cfg.executor.max_retries, 3);
    }
}
