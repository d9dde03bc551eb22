//! Queue task that runs a deferred batch.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use super::request::BatchJob;
use super::BatchService;
use crate::queue::{QueueError, TaskHandler};

/// Task name batches are enqueued under.
pub const BATCH_TASK: &str = "batch.run";

/// Runs a [`BatchJob`] payload through the [`BatchService`] and returns
/// the batch summary as the job result.
pub struct BatchTask {
    service: Arc<BatchService>,
}

impl BatchTask {
    pub fn new(service: Arc<BatchService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TaskHandler for BatchTask {
    fn name(&self) -> &str {
        BATCH_TASK
    }

    async fn run(&self, payload: Value) -> Result<Value, QueueError> {
        let job: BatchJob = serde_json::from_value(payload)?;
        info!(batch_id = %job.batch_id, items = job.items.len(), "Running queued batch");

        let summary = self
            .service
            .execute(job)
            .await
            .map_err(|e| QueueError::Task(e.to_string()))?;

        Ok(serde_json::to_value(&summary)?)
    }
}
