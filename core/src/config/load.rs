use std::path::{Path, PathBuf};

use anyhow::Context;

use super::types::AppConfig;

/// Default per-user data directory: ~/.stackrun
pub fn get_stackrun_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".stackrun"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.stackrun/config.toml
    let user_config = get_stackrun_data_dir()?.join("config.toml");

    // Priority 2: ./stackrun.toml (current directory)
    let local_config = Path::new("stackrun.toml");

    let mut cfg = if user_config.exists() {
        read_config(&user_config)?
    } else if local_config.exists() {
        read_config(local_config)?
    } else {
        AppConfig::default()
    };

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

/// Load one explicit file, then apply environment overrides.
pub fn load_from_path(path: impl AsRef<Path>) -> anyhow::Result<AppConfig> {
    let mut cfg = read_config(path.as_ref())?;
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

fn read_config(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    toml::from_str::<AppConfig>(&s).with_context(|| format!("parse config {}", path.display()))
}

/// Environment variable overrides (highest priority). Blank values are ignored.
pub(crate) fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("STACKRUN_MAX_PARALLEL") {
        cfg.executor.max_parallel_units = v
            .trim()
            .parse()
            .with_context(|| format!("STACKRUN_MAX_PARALLEL: invalid value {v:?}"))?;
    }
    if let Some(v) = get("STACKRUN_STACK_TIMEOUT_SECS") {
        cfg.executor.stack_timeout_secs = v
            .trim()
            .parse()
            .with_context(|| format!("STACKRUN_STACK_TIMEOUT_SECS: invalid value {v:?}"))?;
    }
    if let Some(v) = get("STACKRUN_MAX_RETRIES") {
        cfg.executor.max_retries = v
            .trim()
            .parse()
            .with_context(|| format!("STACKRUN_MAX_RETRIES: invalid value {v:?}"))?;
    }
    if let Some(v) = get("STACKRUN_CONTINUE_ON_ERROR") {
        cfg.executor.continue_on_error = parse_flag("STACKRUN_CONTINUE_ON_ERROR", &v)?;
    }
    if let Some(v) = get("STACKRUN_DRY_RUN") {
        cfg.executor.dry_run = parse_flag("STACKRUN_DRY_RUN", &v)?;
    }
    if let Some(v) = get("STACKRUN_LOG_LEVEL") {
        cfg.logging.level = v;
    }

    Ok(())
}

fn parse_flag(key: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("{key}: expected a boolean, got {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn reads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [executor]
            max_parallel_units = 3
            retry_delay_ms = 250
            "#
        )
        .unwrap();

        let cfg = read_config(file.path()).unwrap();
        assert_eq!(cfg.executor.max_parallel_units, 3);
        assert_eq!(cfg.executor.retry_delay_ms, 250);
        assert_eq!(cfg.executor.stack_timeout_secs, 3600);
    }

    #[test]
    fn malformed_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stackrun.toml");
        std::fs::write(&path, "[executor\nmax_parallel_units = ").unwrap();

        let err = read_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("stackrun.toml"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_config(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn env_overrides_win() {
        let mut cfg = AppConfig::default();
        apply_env_overrides(
            &mut cfg,
            env(&[
                ("STACKRUN_MAX_PARALLEL", "2"),
                ("STACKRUN_STACK_TIMEOUT_SECS", "120"),
                ("STACKRUN_MAX_RETRIES", "0"),
                ("STACKRUN_CONTINUE_ON_ERROR", "yes"),
                ("STACKRUN_DRY_RUN", "true"),
                ("STACKRUN_LOG_LEVEL", "debug"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.executor.max_parallel_units, 2);
        assert_eq!(cfg.executor.stack_timeout_secs, 120);
        assert_eq!(cfg.executor.max_retries, 0);
        assert!(cfg.executor.continue_on_error);
        assert!(cfg.executor.dry_run);
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut cfg = AppConfig::default();
        apply_env_overrides(&mut cfg, env(&[("STACKRUN_MAX_PARALLEL", "  ")])).unwrap();
        assert_eq!(cfg.executor.max_parallel_units, 10);
    }

    #[test]
    fn bad_env_values_are_reported() {
        let mut cfg = AppConfig::default();
        let err = apply_env_overrides(&mut cfg, env(&[("STACKRUN_DRY_RUN", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("STACKRUN_DRY_RUN"));

        let err =
            apply_env_overrides(&mut cfg, env(&[("STACKRUN_MAX_PARALLEL", "many")])).unwrap_err();
        assert!(err.to_string().contains("STACKRUN_MAX_PARALLEL"));
    }
}
