//! Configuration for the batch module.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Execution parameters of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum items converted at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Largest accepted batch.
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Time budget of one converter attempt in seconds.
    #[serde(default = "default_item_timeout")]
    pub item_timeout_secs: u64,

    /// Skip items whose planned output already exists.
    #[serde(default = "default_skip_existing")]
    pub skip_existing: bool,

    /// Fixed gap between converter invocations in milliseconds.
    #[serde(default)]
    pub delay_between_requests_ms: u64,

    /// Upper bound of the random extra delay in milliseconds.
    #[serde(default)]
    pub jitter_ms: u64,

    /// Retry configuration.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Extra attempts after the first failure.
    #[serde(default)]
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub initial_delay_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_concurrency() -> usize {
    3
}

fn default_max_items() -> usize {
    100
}

fn default_item_timeout() -> u64 {
    600
}

fn default_skip_existing() -> bool {
    true
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_items: default_max_items(),
            item_timeout_secs: default_item_timeout(),
            skip_existing: default_skip_existing(),
            delay_between_requests_ms: 0,
            jitter_ms: 0,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: default_retry_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl BatchConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pacing(mut self, delay_ms: u64, jitter_ms: u64) -> Self {
        self.delay_between_requests_ms = delay_ms;
        self.jitter_ms = jitter_ms;
        self
    }

    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.item_timeout_secs)
    }

    /// Whether any pacing is configured.
    pub fn is_paced(&self) -> bool {
        self.delay_between_requests_ms > 0 || self.jitter_ms > 0
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt as i32);
        Duration::from_millis((self.initial_delay_ms as f64 * factor) as u64)
    }
}
