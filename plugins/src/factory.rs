use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use stackrun_core::executor::traits::{OutputRendererPlugin, RetryStrategyPlugin};
use stackrun_core::executor::types::{ExecutorConfig, OutputConfig, RetryConfig};
use stackrun_core::executor::FixedDelay;
use stackrun_core::ExecutionEngine;

use crate::executor::{
    ExponentialBackoffPlugin, JsonlRendererPlugin, LinearRetryPlugin, ProgressBarRendererPlugin,
    TextRendererPlugin,
};

pub fn build_retry_strategy(cfg: &RetryConfig) -> Result<Arc<dyn RetryStrategyPlugin>> {
    match cfg.strategy.trim() {
        "" | "fixed" => Ok(Arc::new(FixedDelay)),
        "exponential" | "exponential-backoff" => Ok(Arc::new(ExponentialBackoffPlugin::new(cfg))),
        "linear" => Ok(Arc::new(LinearRetryPlugin::new(cfg))),
        other => anyhow::bail!("unknown retry strategy: {other}"),
    }
}

/// `None` means events go to `tracing` only.
pub fn build_renderer(cfg: &OutputConfig) -> Result<Option<Arc<dyn OutputRendererPlugin>>> {
    if cfg.progress_bar && cfg.format != "jsonl" {
        return Ok(Some(Arc::new(ProgressBarRendererPlugin::new(cfg.ascii_only))));
    }
    match cfg.format.trim() {
        "text" => Ok(Some(Arc::new(TextRendererPlugin::new(cfg.ascii_only)))),
        "jsonl" => Ok(Some(Arc::new(JsonlRendererPlugin::new(cfg.pretty_print)))),
        "log" | "none" => Ok(None),
        other => anyhow::bail!("unknown output format: {other}"),
    }
}

pub fn build_engine(cfg: &ExecutorConfig) -> Result<ExecutionEngine> {
    let policy = cfg.to_policy()?;
    let strategy = build_retry_strategy(&cfg.retry)?;
    let renderer = build_renderer(&cfg.output)?;
    debug!(
        retry_strategy = strategy.name(),
        renderer = renderer.as_ref().map(|r| r.name()).unwrap_or("tracing"),
        max_parallel = policy.max_parallel_units,
        "assembling execution engine"
    );

    let mut builder = ExecutionEngine::builder(policy).retry_strategy(strategy);
    if let Some(renderer) = renderer {
        builder = builder.renderer(renderer);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_strategy_selection() {
        let mut cfg = RetryConfig::default();
        assert_eq!(build_retry_strategy(&cfg).unwrap().name(), "fixed");

        cfg.strategy = "exponential-backoff".to_string();
        assert_eq!(build_retry_strategy(&cfg).unwrap().name(), "exponential-backoff");

        cfg.strategy = "linear".to_string();
        assert_eq!(build_retry_strategy(&cfg).unwrap().name(), "linear");

        cfg.strategy = "fibonacci".to_string();
        assert!(build_retry_strategy(&cfg).is_err());
    }

    #[test]
    fn test_renderer_selection() {
        let mut cfg = OutputConfig::default();
        assert_eq!(build_renderer(&cfg).unwrap().unwrap().format(), "text");

        cfg.format = "jsonl".to_string();
        cfg.progress_bar = true;
        assert_eq!(build_renderer(&cfg).unwrap().unwrap().format(), "jsonl");

        cfg.format = "log".to_string();
        cfg.progress_bar = false;
        assert!(build_renderer(&cfg).unwrap().is_none());

        cfg.format = "xml".to_string();
        assert!(build_renderer(&cfg).is_err());
    }

    #[test]
    fn test_build_engine_validates_policy() {
        let cfg = ExecutorConfig {
            max_parallel_units: 0,
            ..ExecutorConfig::default()
        };
        assert!(build_engine(&cfg).is_err());

        let engine = build_engine(&ExecutorConfig::default()).unwrap();
        assert_eq!(engine.policy().max_parallel_units, 10);
    }
}
