//! Bounded fan-out executor for batches.

use rand::Rng;
use std::any::Any;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::converter::{ConversionJob, ConverterInvoker};
use crate::metrics;
use crate::progress::ProgressTracker;

use super::config::{BatchConfig, RetryConfig};
use super::error::BatchError;
use super::planner::OutputPlanner;
use super::policy::{CancelHandle, SkipPolicy, CANCELLED_REASON};
use super::summary::BatchSummary;
use super::types::{BatchItem, BatchResult, ConversionOutcome, FailureKind};

/// Runs the items of one batch with bounded concurrency.
///
/// Every item yields exactly one [`BatchResult`]. Converter errors, timeouts
/// and panics are isolated to their item; the batch itself only fails when
/// it cannot start.
pub struct BatchProcessor {
    config: BatchConfig,
    tracker: ProgressTracker,
    batch_id: String,
    operation: String,
    output_dir: Option<PathBuf>,
    skip_policy: SkipPolicy,
    cancel: CancelHandle,
}

impl BatchProcessor {
    /// Creates a processor with a fresh batch ID.
    pub fn new(config: BatchConfig, tracker: ProgressTracker) -> Self {
        let skip_policy = if config.skip_existing {
            SkipPolicy::OutputExists
        } else {
            SkipPolicy::Never
        };

        Self {
            config,
            tracker,
            batch_id: Uuid::new_v4().to_string(),
            operation: "batch".to_string(),
            output_dir: None,
            skip_policy,
            cancel: CancelHandle::default(),
        }
    }

    /// Uses a caller-chosen batch ID, e.g. one already handed out to a client.
    pub fn with_batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = batch_id.into();
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    /// Directory created before any item runs.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_skip_policy(mut self, policy: SkipPolicy) -> Self {
        self.skip_policy = policy;
        self
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Processes every item and returns the batch summary.
    pub async fn run(
        &self,
        items: Vec<BatchItem>,
        invoker: Arc<dyn ConverterInvoker>,
    ) -> Result<BatchSummary, BatchError> {
        self.validate(&items)?;

        if items.is_empty() {
            let mut summary = BatchSummary::empty(&self.batch_id, &self.operation);
            summary.output_dir = self.output_dir.clone();
            return Ok(summary);
        }

        let start = Instant::now();
        let total = items.len();
        self.tracker
            .initialize(&self.batch_id, total, &self.operation)
            .await;

        if let Some(dir) = &self.output_dir {
            if let Err(e) = tokio::fs::create_dir_all(dir).await {
                let message = format!(
                    "Failed to create output directory {}: {}",
                    dir.display(),
                    e
                );
                error!(batch_id = %self.batch_id, "{}", message);
                self.tracker.fail(&self.batch_id, &message).await;
                self.tracker.flush().await;
                return Err(BatchError::Setup(message));
            }
        }

        let items = OutputPlanner::new(!self.config.skip_existing).plan(items);

        info!(
            batch_id = %self.batch_id,
            operation = %self.operation,
            items = total,
            concurrency = self.config.concurrency,
            converter = invoker.name(),
            "Starting batch"
        );

        let ctx = Arc::new(RunContext {
            batch_id: self.batch_id.clone(),
            tracker: self.tracker.clone(),
            invoker,
            semaphore: Semaphore::new(self.config.concurrency),
            skip_policy: self.skip_policy.clone(),
            cancel: self.cancel.clone(),
            timeout: self.config.item_timeout(),
            retry: self.config.retry.clone(),
            pacer: self.config.is_paced().then(|| Pacer {
                lock: Mutex::new(()),
                delay: Duration::from_millis(self.config.delay_between_requests_ms),
                jitter_ms: self.config.jitter_ms,
            }),
        });

        // Declared before `tasks` so the item tasks are aborted first when the
        // run is dropped.
        let mut guard = InterruptGuard {
            tracker: &self.tracker,
            batch_id: &self.batch_id,
            armed: true,
        };

        let mut identities = Vec::with_capacity(total);
        let mut tasks = JoinSet::new();
        for (index, item) in items.into_iter().enumerate() {
            identities.push((item.id.clone(), item.source.clone()));
            let ctx = Arc::clone(&ctx);
            tasks.spawn(async move { (index, process_item(ctx, item).await) });
        }

        let mut slots: Vec<Option<BatchResult>> = std::iter::repeat_with(|| None).take(total).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => error!(batch_id = %self.batch_id, error = %e, "Item task failed"),
            }
        }

        let mut results = Vec::with_capacity(total);
        for (slot, (item_id, source)) in slots.into_iter().zip(identities) {
            let result = match slot {
                Some(result) => result,
                None => {
                    // Only reachable if progress reporting itself panicked.
                    let message = "Item task failed before reporting an outcome".to_string();
                    self.tracker
                        .record_failure(&self.batch_id, &message, Some(&source))
                        .await;
                    BatchResult {
                        item_id,
                        source,
                        outcome: ConversionOutcome::failure(FailureKind::Panicked, message),
                        duration_ms: 0,
                    }
                }
            };
            results.push(result);
        }

        guard.armed = false;
        self.tracker.complete(&self.batch_id).await;
        self.tracker.flush().await;
        let degraded = self.tracker.take_degraded(&self.batch_id);
        if degraded {
            warn!(batch_id = %self.batch_id, "Progress tracking was degraded during the batch");
        }

        let summary = BatchSummary::from_results(
            &self.batch_id,
            &self.operation,
            self.output_dir.clone(),
            results,
            start.elapsed(),
            degraded,
        );

        info!(
            batch_id = %summary.batch_id,
            successful = summary.successful,
            failed = summary.failed,
            skipped = summary.skipped,
            elapsed_ms = summary.processing_time_ms,
            "Batch finished"
        );

        Ok(summary)
    }

    fn validate(&self, items: &[BatchItem]) -> Result<(), BatchError> {
        if self.config.concurrency == 0 {
            return Err(BatchError::Setup(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if items.len() > self.config.max_items {
            return Err(BatchError::Setup(format!(
                "batch of {} items exceeds the limit of {}",
                items.len(),
                self.config.max_items
            )));
        }

        let mut seen = HashSet::new();
        for item in items {
            if !seen.insert(item.id.as_str()) {
                return Err(BatchError::Setup(format!(
                    "duplicate item id: {}",
                    item.id
                )));
            }
        }
        Ok(())
    }
}

/// State shared by the item tasks of one run.
struct RunContext {
    batch_id: String,
    tracker: ProgressTracker,
    invoker: Arc<dyn ConverterInvoker>,
    semaphore: Semaphore,
    skip_policy: SkipPolicy,
    cancel: CancelHandle,
    timeout: Duration,
    retry: RetryConfig,
    pacer: Option<Pacer>,
}

/// Marks the batch failed when a run is dropped before all items resolve,
/// e.g. when the caller disconnects or a job timeout aborts the worker task.
struct InterruptGuard<'a> {
    tracker: &'a ProgressTracker,
    batch_id: &'a str,
    armed: bool,
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(batch_id = %self.batch_id, "Batch run dropped before completion");
            self.tracker.try_fail(self.batch_id, INTERRUPTED_MESSAGE);
        }
    }
}

const INTERRUPTED_MESSAGE: &str = "Batch run was interrupted before completion";

/// Spaces converter invocations apart.
struct Pacer {
    lock: Mutex<()>,
    delay: Duration,
    jitter_ms: u64,
}

impl Pacer {
    async fn wait(&self) {
        let _guard = self.lock.lock().await;
        let jitter = if self.jitter_ms > 0 {
            rand::rng().random_range(0..=self.jitter_ms)
        } else {
            0
        };
        let delay = self.delay + Duration::from_millis(jitter);
        if !delay.is_zero() {
            debug!(delay_ms = delay.as_millis() as u64, "Pacing delay");
            tokio::time::sleep(delay).await;
        }
    }
}

async fn process_item(ctx: Arc<RunContext>, item: BatchItem) -> BatchResult {
    let start = Instant::now();

    let outcome = {
        let Ok(_permit) = ctx.semaphore.acquire().await else {
            unreachable!("item semaphore is never closed");
        };
        run_item(&ctx, &item).await
    };

    record_outcome(&ctx, &item, &outcome).await;

    let elapsed = start.elapsed();
    metrics::BATCH_ITEMS
        .with_label_values(&[outcome.label()])
        .inc();
    metrics::ITEM_DURATION
        .with_label_values(&[outcome.label()])
        .observe(elapsed.as_secs_f64());

    BatchResult {
        item_id: item.id,
        source: item.source,
        outcome,
        duration_ms: elapsed.as_millis() as u64,
    }
}

async fn run_item(ctx: &RunContext, item: &BatchItem) -> ConversionOutcome {
    if ctx.cancel.is_cancelled() {
        return ConversionOutcome::skipped(CANCELLED_REASON);
    }

    ctx.tracker.update_current(&ctx.batch_id, &item.source).await;

    if let Some(reason) = ctx.skip_policy.check(item) {
        debug!(item = %item.id, reason = %reason, "Skipping item");
        return ConversionOutcome::skipped(reason);
    }

    let mut attempt = 0;
    loop {
        let mut job = ConversionJob::new(ctx.batch_id.clone(), item.clone());
        job.attempt = attempt + 1;
        let outcome = invoke_once(ctx, job).await;

        let message = match &outcome {
            ConversionOutcome::Failure { message, .. } => message.clone(),
            _ => {
                if attempt > 0 {
                    info!(item = %item.id, attempt = attempt + 1, "Item succeeded after retry");
                }
                return outcome;
            }
        };

        if attempt >= ctx.retry.max_retries || ctx.cancel.is_cancelled() {
            return outcome;
        }

        let backoff = ctx.retry.backoff(attempt);
        warn!(
            item = %item.id,
            source = %item.source,
            attempt = attempt + 1,
            error = %message,
            backoff_ms = backoff.as_millis() as u64,
            "Item attempt failed, retrying"
        );
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}

/// One converter call under the item timeout.
///
/// The call runs in its own task so a panic surfaces as a join error instead
/// of tearing down the item task. The task is aborted on timeout and when the
/// item task itself is aborted.
async fn invoke_once(ctx: &RunContext, job: ConversionJob) -> ConversionOutcome {
    if let Some(pacer) = &ctx.pacer {
        pacer.wait().await;
    }

    let item_id = job.item.id.clone();
    let invoker = Arc::clone(&ctx.invoker);
    let mut call = JoinSet::new();
    call.spawn(async move { invoker.invoke(job).await });

    let joined = tokio::time::timeout(ctx.timeout, call.join_next()).await;
    match joined {
        Ok(Some(Ok(outcome))) => outcome,
        Ok(Some(Err(e))) if e.is_panic() => {
            let message = panic_message(e.into_panic());
            error!(item = %item_id, panic = %message, "Converter panicked");
            ConversionOutcome::failure(
                FailureKind::Panicked,
                format!("Converter panicked: {}", message),
            )
        }
        Ok(Some(Err(e))) => ConversionOutcome::failure(FailureKind::Panicked, e.to_string()),
        Ok(None) => ConversionOutcome::failure(FailureKind::Panicked, "Converter task was lost"),
        Err(_) => {
            call.abort_all();
            debug!(item = %item_id, "Converter timed out");
            ConversionOutcome::failure(
                FailureKind::Timeout,
                format!(
                    "Conversion timed out after {}s",
                    ctx.timeout.as_secs_f64()
                ),
            )
        }
    }
}

async fn record_outcome(ctx: &RunContext, item: &BatchItem, outcome: &ConversionOutcome) {
    match outcome {
        ConversionOutcome::Success { .. } => ctx.tracker.record_success(&ctx.batch_id).await,
        ConversionOutcome::Failure { message, .. } => {
            ctx.tracker
                .record_failure(&ctx.batch_id, message, Some(&item.source))
                .await
        }
        ConversionOutcome::Skipped { reason } => {
            ctx.tracker
                .record_skipped(&ctx.batch_id, reason, Some(&item.source))
                .await
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{
        create_progress_system, ProgressConfig, ProgressStatus, ProgressStore,
        SqliteProgressStore,
    };
    use crate::testing::MockConverter;
    use tempfile::TempDir;

    fn tracker() -> ProgressTracker {
        let store: Arc<dyn ProgressStore> = Arc::new(SqliteProgressStore::in_memory().unwrap());
        let (tracker, writer) = create_progress_system(store, &ProgressConfig::default());
        tokio::spawn(writer.run());
        tracker
    }

    fn items(n: usize) -> Vec<BatchItem> {
        (1..=n)
            .map(|i| BatchItem::new(i.to_string(), format!("https://example.com/{}", i)))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_batch_returns_empty_summary() {
        let tracker = tracker();
        let processor = BatchProcessor::new(BatchConfig::default(), tracker.clone());
        let summary = processor
            .run(Vec::new(), Arc::new(MockConverter::new()))
            .await
            .unwrap();

        assert_eq!(summary.total_items, 0);
        tracker.flush().await;
        assert!(tracker.get(processor.batch_id()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_zero_concurrency_before_tracking() {
        let tracker = tracker();
        let processor =
            BatchProcessor::new(BatchConfig::default().with_concurrency(0), tracker.clone());
        let result = processor.run(items(2), Arc::new(MockConverter::new())).await;

        assert!(matches!(result, Err(BatchError::Setup(_))));
        tracker.flush().await;
        assert!(tracker.get(processor.batch_id()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_oversized_batch() {
        let config = BatchConfig {
            max_items: 3,
            ..Default::default()
        };
        let processor = BatchProcessor::new(config, tracker());
        let result = processor.run(items(4), Arc::new(MockConverter::new())).await;
        assert!(matches!(result, Err(BatchError::Setup(msg)) if msg.contains("exceeds")));
    }

    #[tokio::test]
    async fn test_rejects_duplicate_ids() {
        let processor = BatchProcessor::new(BatchConfig::default(), tracker());
        let dup = vec![BatchItem::new("a", "u1"), BatchItem::new("a", "u2")];
        let result = processor.run(dup, Arc::new(MockConverter::new())).await;
        assert!(matches!(result, Err(BatchError::Setup(msg)) if msg.contains("duplicate")));
    }

    #[tokio::test]
    async fn test_unwritable_output_dir_fails_batch() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a dir").unwrap();

        let tracker = tracker();
        let processor = BatchProcessor::new(BatchConfig::default(), tracker.clone())
            .with_output_dir(blocker.join("out"));
        let result = processor.run(items(2), Arc::new(MockConverter::new())).await;

        assert!(matches!(result, Err(BatchError::Setup(_))));
        let record = tracker.get(processor.batch_id()).unwrap().unwrap();
        assert_eq!(record.status, ProgressStatus::Failed);
        assert!(record.error.unwrap().contains("output directory"));
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let converter = MockConverter::new().panic_on("https://example.com/2");
        let processor = BatchProcessor::new(BatchConfig::default(), tracker());
        let summary = processor.run(items(3), Arc::new(converter)).await.unwrap();

        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].kind, FailureKind::Panicked);
        assert!(summary.failures[0].error.contains("mock panic"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_failure() {
        let converter = MockConverter::new().with_delay_for("https://example.com/1", Duration::from_secs(30));
        let config = BatchConfig::default().with_item_timeout(Duration::from_secs(1));
        let processor = BatchProcessor::new(config, tracker());

        let started = Instant::now();
        let summary = processor.run(items(2), Arc::new(converter)).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].kind, FailureKind::Timeout);
        assert_eq!(summary.failures[0].source, "https://example.com/1");
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let converter = Arc::new(MockConverter::new().fail_times("https://example.com/1", 2));
        let config = BatchConfig::default().with_retry(RetryConfig {
            max_retries: 2,
            initial_delay_ms: 10,
            backoff_multiplier: 2.0,
        });
        let processor = BatchProcessor::new(config, tracker());
        let summary = processor
            .run(items(1), Arc::clone(&converter) as Arc<dyn ConverterInvoker>)
            .await
            .unwrap();

        assert_eq!(summary.successful, 1);
        assert_eq!(converter.calls_for("https://example.com/1"), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let converter = Arc::new(MockConverter::new().fail_times("https://example.com/1", 5));
        let config = BatchConfig::default().with_retry(RetryConfig {
            max_retries: 1,
            initial_delay_ms: 10,
            backoff_multiplier: 2.0,
        });
        let processor = BatchProcessor::new(config, tracker());
        let summary = processor
            .run(items(1), Arc::clone(&converter) as Arc<dyn ConverterInvoker>)
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(converter.calls_for("https://example.com/1"), 2);
    }

    #[tokio::test]
    async fn test_cancel_skips_pending_items() {
        let converter = MockConverter::new().with_delay(Duration::from_millis(200));
        let processor = BatchProcessor::new(BatchConfig::default().with_concurrency(1), tracker());
        let cancel = processor.cancel_handle();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let summary = processor.run(items(4), Arc::new(converter)).await.unwrap();
        canceller.await.unwrap();

        assert_eq!(summary.successful, 1);
        assert_eq!(summary.skipped, 3);
        assert!(summary
            .skipped_details
            .iter()
            .all(|s| s.reason == CANCELLED_REASON));
    }

    #[tokio::test]
    async fn test_dropped_run_aborts_items_and_fails_record() {
        let tracker = tracker();
        let converter = Arc::new(MockConverter::new().with_delay(Duration::from_millis(100)));
        let processor =
            BatchProcessor::new(BatchConfig::default().with_concurrency(1), tracker.clone());

        let run = processor.run(items(5), Arc::clone(&converter) as Arc<dyn ConverterInvoker>);
        let result = tokio::time::timeout(Duration::from_millis(150), run).await;
        assert!(result.is_err());

        let calls_at_drop = converter.call_count();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(converter.call_count(), calls_at_drop);
        assert_eq!(converter.max_concurrency(), 1);

        tracker.flush().await;
        let record = tracker.get(processor.batch_id()).unwrap().unwrap();
        assert_eq!(record.status, ProgressStatus::Failed);
        assert!(record.processed < 5);
        assert!(record.error.unwrap().contains("interrupted"));
    }

    #[tokio::test]
    async fn test_pacing_spaces_invocations() {
        let converter = MockConverter::new();
        let config = BatchConfig::default()
            .with_concurrency(3)
            .with_pacing(100, 0);
        let processor = BatchProcessor::new(config, tracker());

        let started = Instant::now();
        let summary = processor.run(items(3), Arc::new(converter)).await.unwrap();

        assert_eq!(summary.successful, 3);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42u8)), "unknown panic");
    }
}
