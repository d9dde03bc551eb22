//! Batch submission service.
//!
//! Resolves a [`BatchRequest`] into items, asks the admission controller
//! whether to run it now, and either runs it through a [`BatchProcessor`]
//! or hands it to the job queue for a worker to pick up.

mod batch_task;
mod request;

pub use batch_task::{BatchTask, BATCH_TASK};
pub use request::{BatchJob, BatchRequest, BatchSource, DirectorySource};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::admission::{AdmissionController, AdmissionDecision, Workload};
use crate::batch::{BatchConfig, BatchError, BatchProcessor, BatchSummary};
use crate::converter::ConverterRegistry;
use crate::metrics;
use crate::progress::{ProgressRecord, ProgressTracker};
use crate::queue::{EnqueueRequest, JobInfo, JobQueue, QueueError, QueueName};

/// Outcome of submitting a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Submission {
    /// Ran inline.
    Completed { summary: BatchSummary },
    /// Deferred to a background worker; poll progress with `batch_id`.
    Queued {
        job_id: String,
        batch_id: String,
        queue: QueueName,
        estimated_secs: u64,
    },
}

/// Entry point for running batches, inline or queued.
pub struct BatchService {
    config: BatchConfig,
    admission: AdmissionController,
    converters: ConverterRegistry,
    tracker: ProgressTracker,
    queue: Arc<dyn JobQueue>,
}

impl BatchService {
    pub fn new(
        config: BatchConfig,
        admission: AdmissionController,
        converters: ConverterRegistry,
        tracker: ProgressTracker,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            config,
            admission,
            converters,
            tracker,
            queue,
        }
    }

    /// Admits and runs (or enqueues) a batch.
    ///
    /// Bad sources, an unconfigured converter kind and out-of-range
    /// parameters are rejected before anything runs or is queued.
    pub async fn submit(
        &self,
        request: BatchRequest,
        auto_queue: bool,
    ) -> Result<Submission, BatchError> {
        let items = request.resolve_items()?;
        let config = request.batch_config(&self.config);
        if config.concurrency == 0 {
            return Err(BatchError::Setup("concurrency must be at least 1".to_string()));
        }
        if items.len() > config.max_items {
            return Err(BatchError::Setup(format!(
                "Batch has {} items, the maximum is {}",
                items.len(),
                config.max_items
            )));
        }
        self.converters.resolve(request.kind)?;

        let workload = Workload::Batch {
            kind: request.kind,
            items: items.len(),
        };
        let admission = self.admission.admit(&workload, auto_queue);
        let job = BatchJob {
            batch_id: Uuid::new_v4().to_string(),
            request,
            items,
        };

        match admission.decision {
            AdmissionDecision::Sync => {
                metrics::BATCHES_TOTAL.with_label_values(&["sync"]).inc();
                let summary = self.execute(job).await?;
                Ok(Submission::Completed { summary })
            }
            AdmissionDecision::Enqueue => {
                let batch_id = job.batch_id.clone();
                let total = job.items.len();
                let operation = job.request.kind.operation();
                let payload = serde_json::to_value(&job).map_err(QueueError::from)?;

                // Persisted before a worker can claim the job, so the
                // worker's own writes always land after it.
                self.tracker.announce(&batch_id, total, operation).await;
                self.tracker.flush().await;

                let enqueued = self.queue.enqueue(EnqueueRequest::new(
                    admission.queue,
                    BATCH_TASK,
                    payload,
                    workload.job_timeout(),
                ));
                let handle = match enqueued {
                    Ok(handle) => handle,
                    Err(e) => {
                        let message = format!("Failed to enqueue batch: {}", e);
                        error!(batch_id = %batch_id, "{}", message);
                        self.tracker.fail(&batch_id, &message).await;
                        self.tracker.flush().await;
                        return Err(e.into());
                    }
                };

                metrics::BATCHES_TOTAL.with_label_values(&["queued"]).inc();
                info!(
                    batch_id = %batch_id,
                    job_id = %handle.job_id,
                    queue = %handle.queue,
                    items = total,
                    "Batch queued"
                );

                Ok(Submission::Queued {
                    job_id: handle.job_id,
                    batch_id,
                    queue: handle.queue,
                    estimated_secs: admission.estimated.as_secs(),
                })
            }
        }
    }

    /// Runs an already resolved batch to completion.
    pub async fn execute(&self, job: BatchJob) -> Result<BatchSummary, BatchError> {
        let invoker = self.converters.resolve(job.request.kind)?;
        let config = job.request.batch_config(&self.config);

        let mut processor = BatchProcessor::new(config, self.tracker.clone())
            .with_batch_id(job.batch_id)
            .with_operation(job.request.kind.operation());
        if let Some(dir) = job.request.output_dir {
            processor = processor.with_output_dir(dir);
        }

        processor.run(job.items, invoker).await
    }

    /// Progress record of a batch, from whichever process runs it.
    pub fn progress(&self, batch_id: &str) -> Result<Option<ProgressRecord>, BatchError> {
        Ok(self.tracker.get(batch_id)?)
    }

    pub fn job(&self, job_id: &str) -> Result<Option<JobInfo>, BatchError> {
        Ok(self.queue.job_info(job_id)?)
    }

    pub fn jobs(&self, queue: QueueName, limit: usize) -> Result<Vec<JobInfo>, BatchError> {
        Ok(self.queue.list_jobs(queue, limit)?)
    }
}
