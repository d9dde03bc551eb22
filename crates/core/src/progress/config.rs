//! Configuration for progress tracking.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retention and sizing of progress records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Seconds a record stays readable after its last write.
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    /// Maximum entries kept in a record's error log.
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,

    /// Capacity of the writer's command channel.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_ttl() -> u64 {
    24 * 60 * 60
}

fn default_max_errors() -> usize {
    100
}

fn default_buffer_size() -> usize {
    1024
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            max_errors: default_max_errors(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl ProgressConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}
