//! Trait definitions for the queue module.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::types::{ClaimedJob, EnqueueRequest, JobHandle, JobInfo, QueueName};
use super::QueueError;

/// Producer and status side of a job queue.
pub trait JobQueue: Send + Sync {
    /// Persist a job; it becomes visible to workers immediately.
    fn enqueue(&self, request: EnqueueRequest) -> Result<JobHandle, QueueError>;

    /// Status of one job, `None` if unknown.
    fn job_info(&self, job_id: &str) -> Result<Option<JobInfo>, QueueError>;

    /// Most recent jobs of a queue, newest first.
    fn list_jobs(&self, queue: QueueName, limit: usize) -> Result<Vec<JobInfo>, QueueError>;
}

/// Consumer side of a job queue.
pub trait JobSource: Send + Sync {
    /// Atomically take the oldest queued job of `queues`.
    fn claim_next(&self, queues: &[QueueName]) -> Result<Option<ClaimedJob>, QueueError>;

    fn finish(&self, job_id: &str, result: &Value) -> Result<(), QueueError>;

    fn fail(&self, job_id: &str, error: &str) -> Result<(), QueueError>;

    /// Put jobs left `started` by a dead worker back to `queued`.
    fn requeue_interrupted(&self, queues: &[QueueName]) -> Result<usize, QueueError>;
}

/// Executes one kind of background task.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Task name jobs are enqueued under.
    fn name(&self) -> &str;

    async fn run(&self, payload: Value) -> Result<Value, QueueError>;
}

/// Task handlers by name.
#[derive(Default, Clone)]
pub struct TaskRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    pub fn with(mut self, handler: Arc<dyn TaskHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn get(&self, task: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(task).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
