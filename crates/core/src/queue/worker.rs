//! Background job worker.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::traits::{JobSource, TaskRegistry};
use super::types::{ClaimedJob, JobStatus, QueueName};
use super::QueueError;
use crate::metrics;

/// Polls queues and dispatches claimed jobs to their task handlers.
pub struct JobWorker {
    source: Arc<dyn JobSource>,
    registry: TaskRegistry,
    queues: Vec<QueueName>,
    poll_interval: Duration,
}

impl JobWorker {
    pub fn new(source: Arc<dyn JobSource>, registry: TaskRegistry, queues: Vec<QueueName>) -> Self {
        Self {
            source,
            registry,
            queues,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run until `shutdown` flips to `true`.
    ///
    /// Jobs left `started` by a previous worker are re-queued first.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), QueueError> {
        let requeued = self.source.requeue_interrupted(&self.queues)?;
        if requeued > 0 {
            warn!(requeued, "Re-queued jobs interrupted by a previous worker");
        }

        let queue_names: Vec<&str> = self.queues.iter().map(|q| q.as_str()).collect();
        info!(queues = ?queue_names, "Job worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let worked = match self.run_once().await {
                Ok(worked) => worked,
                Err(e) => {
                    error!(error = %e, "Failed to poll job queue");
                    false
                }
            };

            if !worked {
                tokio::select! {
                    _ = shutdown.changed() => {}
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }

        info!("Job worker shutting down");
        Ok(())
    }

    /// Claim and execute at most one job. Returns whether a job ran.
    pub async fn run_once(&self) -> Result<bool, QueueError> {
        let Some(job) = self.source.claim_next(&self.queues)? else {
            return Ok(false);
        };

        info!(job_id = %job.job_id, queue = %job.queue, task = %job.task, "Job started");
        let queue = job.queue;
        let job_id = job.job_id.clone();

        match self.execute(job).await {
            Ok(result) => {
                self.source.finish(&job_id, &result)?;
                metrics::JOBS_TOTAL
                    .with_label_values(&[queue.as_str(), JobStatus::Finished.as_str()])
                    .inc();
                info!(job_id = %job_id, "Job finished");
            }
            Err(message) => {
                self.source.fail(&job_id, &message)?;
                metrics::JOBS_TOTAL
                    .with_label_values(&[queue.as_str(), JobStatus::Failed.as_str()])
                    .inc();
                warn!(job_id = %job_id, error = %message, "Job failed");
            }
        }

        Ok(true)
    }

    async fn execute(&self, job: ClaimedJob) -> Result<Value, String> {
        let handler = self
            .registry
            .get(&job.task)
            .ok_or_else(|| QueueError::UnknownTask(job.task.clone()).to_string())?;

        let payload = job.payload;
        let mut handle = tokio::spawn(async move { handler.run(payload).await });

        match tokio::time::timeout(job.timeout, &mut handle).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(e))) => Err(e.to_string()),
            Ok(Err(e)) => Err(format!("Task panicked: {}", e)),
            Err(_) => {
                handle.abort();
                debug!(job_id = %job.job_id, "Aborted timed out task");
                Err(format!("Job exceeded timeout of {}s", job.timeout.as_secs()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{EnqueueRequest, JobQueue, SqliteJobQueue, TaskHandler};
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl TaskHandler for Echo {
        fn name(&self) -> &str {
            "test.echo"
        }

        async fn run(&self, payload: Value) -> Result<Value, QueueError> {
            if payload.get("fail").is_some() {
                return Err(QueueError::Task("asked to fail".to_string()));
            }
            if let Some(ms) = payload.get("sleep_ms").and_then(Value::as_u64) {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            Ok(json!({ "echo": payload }))
        }
    }

    fn setup() -> (Arc<SqliteJobQueue>, JobWorker) {
        let queue = Arc::new(SqliteJobQueue::in_memory().unwrap());
        let worker = JobWorker::new(
            Arc::clone(&queue) as Arc<dyn JobSource>,
            TaskRegistry::new().with(Arc::new(Echo)),
            vec![QueueName::Default],
        )
        .with_poll_interval(Duration::from_millis(10));
        (queue, worker)
    }

    fn enqueue(queue: &SqliteJobQueue, task: &str, payload: Value, timeout: Duration) -> String {
        queue
            .enqueue(EnqueueRequest::new(QueueName::Default, task, payload, timeout))
            .unwrap()
            .job_id
    }

    #[tokio::test]
    async fn test_run_once_idle() {
        let (_queue, worker) = setup();
        assert!(!worker.run_once().await.unwrap());
    }

    #[tokio::test]
    async fn test_run_once_stores_result() {
        let (queue, worker) = setup();
        let id = enqueue(&queue, "test.echo", json!({ "x": 1 }), Duration::from_secs(5));

        assert!(worker.run_once().await.unwrap());

        let info = queue.job_info(&id).unwrap().unwrap();
        assert_eq!(info.status, JobStatus::Finished);
        assert_eq!(info.result, Some(json!({ "echo": { "x": 1 } })));
    }

    #[tokio::test]
    async fn test_handler_error_fails_job() {
        let (queue, worker) = setup();
        let id = enqueue(&queue, "test.echo", json!({ "fail": true }), Duration::from_secs(5));

        worker.run_once().await.unwrap();

        let info = queue.job_info(&id).unwrap().unwrap();
        assert_eq!(info.status, JobStatus::Failed);
        assert_eq!(info.error.as_deref(), Some("asked to fail"));
    }

    #[tokio::test]
    async fn test_unknown_task_fails_job() {
        let (queue, worker) = setup();
        let id = enqueue(&queue, "missing.task", json!({}), Duration::from_secs(5));

        worker.run_once().await.unwrap();

        let info = queue.job_info(&id).unwrap().unwrap();
        assert_eq!(info.status, JobStatus::Failed);
        assert!(info.error.unwrap().contains("missing.task"));
    }

    #[tokio::test]
    async fn test_timeout_fails_job() {
        let (queue, worker) = setup();
        let id = enqueue(&queue, "test.echo", json!({ "sleep_ms": 5000 }), Duration::from_secs(1));

        worker.run_once().await.unwrap();

        let info = queue.job_info(&id).unwrap().unwrap();
        assert_eq!(info.status, JobStatus::Failed);
        assert!(info.error.unwrap().contains("timeout"));
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let (queue, worker) = setup();
        let id = enqueue(&queue, "test.echo", json!({ "y": 2 }), Duration::from_secs(5));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(rx));

        let mut finished = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let info = queue.job_info(&id).unwrap().unwrap();
            if info.status == JobStatus::Finished {
                finished = true;
                break;
            }
        }
        assert!(finished);

        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }
}
