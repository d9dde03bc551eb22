//! Progress store that is always down.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::progress::{ProgressRecord, ProgressStore, StoreError};

/// A `ProgressStore` whose every call fails with `StoreError::Unavailable`.
#[derive(Debug, Default)]
pub struct FailingProgressStore {
    attempts: AtomicUsize,
}

impl FailingProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls made against the store.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn refuse(&self) -> StoreError {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        StoreError::Unavailable("connection refused".to_string())
    }
}

impl ProgressStore for FailingProgressStore {
    fn put(&self, _record: &ProgressRecord, _ttl: Duration) -> Result<(), StoreError> {
        Err(self.refuse())
    }

    fn get(&self, _batch_id: &str) -> Result<Option<ProgressRecord>, StoreError> {
        Err(self.refuse())
    }

    fn purge_expired(&self) -> Result<usize, StoreError> {
        Err(self.refuse())
    }
}
