use std::time::Duration;

use thiserror::Error;

use super::ProgressRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Progress store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Trait for progress record storage.
///
/// Records are keyed by batch ID and expire `ttl` after their last write.
pub trait ProgressStore: Send + Sync {
    /// Insert or replace a record, refreshing its expiry.
    fn put(&self, record: &ProgressRecord, ttl: Duration) -> Result<(), StoreError>;

    /// Fetch a record. Unknown and expired IDs yield `Ok(None)`.
    fn get(&self, batch_id: &str) -> Result<Option<ProgressRecord>, StoreError>;

    /// Delete expired records, returns how many were removed.
    fn purge_expired(&self) -> Result<usize, StoreError>;
}
