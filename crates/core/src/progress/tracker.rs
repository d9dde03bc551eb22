use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::writer::{DegradedSet, ProgressCommand};
use super::{ProgressRecord, ProgressStore, ProgressUpdate, StoreError};

/// Handle for reporting batch progress
///
/// This is cheaply cloneable and can be shared across tasks.
/// Mutations are sent through a channel and applied by the `ProgressWriter`.
/// Reads go straight to the store, so they also see batches run by other
/// processes sharing it.
#[derive(Clone)]
pub struct ProgressTracker {
    tx: mpsc::Sender<ProgressCommand>,
    store: Arc<dyn ProgressStore>,
    degraded: DegradedSet,
}

impl ProgressTracker {
    pub(crate) fn new(
        tx: mpsc::Sender<ProgressCommand>,
        store: Arc<dyn ProgressStore>,
        degraded: DegradedSet,
    ) -> Self {
        Self {
            tx,
            store,
            degraded,
        }
    }

    /// Start tracking a batch of `total` items.
    pub async fn initialize(&self, batch_id: &str, total: usize, operation: &str) {
        self.send(ProgressCommand::Initialize {
            batch_id: batch_id.to_string(),
            total,
            operation: operation.to_string(),
            cache: true,
        })
        .await;
    }

    /// Publish a fresh record for a batch another process will run.
    ///
    /// The writer does not keep it in memory, so later updates from this
    /// process read the stored record first.
    pub async fn announce(&self, batch_id: &str, total: usize, operation: &str) {
        self.send(ProgressCommand::Initialize {
            batch_id: batch_id.to_string(),
            total,
            operation: operation.to_string(),
            cache: false,
        })
        .await;
    }

    /// Set the item currently being worked on.
    pub async fn update_current(&self, batch_id: &str, label: &str) {
        self.update(batch_id, ProgressUpdate::CurrentItem(label.to_string()))
            .await;
    }

    pub async fn record_success(&self, batch_id: &str) {
        self.update(batch_id, ProgressUpdate::Success).await;
    }

    pub async fn record_failure(&self, batch_id: &str, message: &str, item: Option<&str>) {
        self.update(
            batch_id,
            ProgressUpdate::Failure {
                message: message.to_string(),
                item: item.map(String::from),
            },
        )
        .await;
    }

    pub async fn record_skipped(&self, batch_id: &str, reason: &str, item: Option<&str>) {
        self.update(
            batch_id,
            ProgressUpdate::Skipped {
                reason: reason.to_string(),
                item: item.map(String::from),
            },
        )
        .await;
    }

    /// Mark the batch completed.
    pub async fn complete(&self, batch_id: &str) {
        self.update(batch_id, ProgressUpdate::Complete).await;
    }

    /// Mark the batch failed with a fatal error.
    pub async fn fail(&self, batch_id: &str, error: &str) {
        self.update(batch_id, ProgressUpdate::Fail(error.to_string()))
            .await;
    }

    /// Like [`fail`](Self::fail) but without waiting for channel capacity,
    /// for use where awaiting is impossible (`Drop`).
    pub fn try_fail(&self, batch_id: &str, error: &str) {
        let command = ProgressCommand::Update {
            batch_id: batch_id.to_string(),
            update: ProgressUpdate::Fail(error.to_string()),
        };
        if let Err(e) = self.tx.try_send(command) {
            tracing::error!(batch_id, "Failed to send progress update: {}", e);
        }
    }

    /// Wait until every mutation sent so far has been applied.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(ProgressCommand::Flush(ack_tx)).await.is_err() {
            tracing::error!("Progress writer is gone, cannot flush");
            return;
        }
        let _ = ack_rx.await;
    }

    /// Read the current record of a batch.
    pub fn get(&self, batch_id: &str) -> Result<Option<ProgressRecord>, StoreError> {
        self.store.get(batch_id)
    }

    /// Whether persisting progress failed for `batch_id`. Clears the flag.
    pub fn take_degraded(&self, batch_id: &str) -> bool {
        self.degraded
            .lock()
            .map(|mut set| set.remove(batch_id))
            .unwrap_or(false)
    }

    async fn update(&self, batch_id: &str, update: ProgressUpdate) {
        self.send(ProgressCommand::Update {
            batch_id: batch_id.to_string(),
            update,
        })
        .await;
    }

    async fn send(&self, command: ProgressCommand) {
        if let Err(e) = self.tx.send(command).await {
            tracing::error!("Failed to send progress update: {}", e);
        }
    }
}
