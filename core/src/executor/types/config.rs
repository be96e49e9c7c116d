use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ExecutorError;

use super::policy::ExecutionPolicy;

/// `[executor]` section of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_max_parallel_units")]
    pub max_parallel_units: usize,

    #[serde(default = "default_stack_timeout_secs")]
    pub stack_timeout_secs: u64,

    #[serde(default)]
    pub per_unit_timeout_secs: Option<u64>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default)]
    pub continue_on_error: bool,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

fn default_max_parallel_units() -> usize {
    10
}

fn default_stack_timeout_secs() -> u64 {
    3600
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    5000
}

fn default_cancel_grace_ms() -> u64 {
    5000
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel_units: default_max_parallel_units(),
            stack_timeout_secs: default_stack_timeout_secs(),
            per_unit_timeout_secs: None,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            continue_on_error: false,
            dry_run: false,
            cancel_grace_ms: default_cancel_grace_ms(),
            retry: RetryConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl ExecutorConfig {
    /// Convert into a validated runtime policy.
    pub fn to_policy(&self) -> Result<ExecutionPolicy, ExecutorError> {
        let policy = ExecutionPolicy {
            max_parallel_units: self.max_parallel_units,
            stack_timeout: Duration::from_secs(self.stack_timeout_secs),
            per_unit_timeout: self.per_unit_timeout_secs.map(Duration::from_secs),
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            continue_on_error: self.continue_on_error,
            dry_run: self.dry_run,
            cancel_grace: Duration::from_millis(self.cancel_grace_ms),
        };
        policy.validate()?;
        Ok(policy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// "fixed", "exponential-backoff" or "linear"
    #[serde(default = "default_retry_strategy")]
    pub strategy: String,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: default_retry_strategy(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_retry_strategy() -> String {
    "fixed".to_string()
}

fn default_max_delay_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// "text", "jsonl" or "log"
    #[serde(default = "default_output_format")]
    pub format: String,
    #[serde(default)]
    pub pretty_print: bool,
    #[serde(default)]
    pub ascii_only: bool,
    #[serde(default)]
    pub progress_bar: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_output_format(),
            pretty_print: false,
            ascii_only: false,
            progress_bar: false,
        }
    }
}

fn default_output_format() -> String {
    "text".to_string()
}
