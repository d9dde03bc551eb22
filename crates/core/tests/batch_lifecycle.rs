//! Batch lifecycle integration tests.
//!
//! These tests run the batch processor end to end with a mock converter:
//! - Partial failure accounting and the concurrency bound
//! - Idempotent re-runs with skip_existing
//! - Progress visibility from a second store connection
//! - Duplicate output naming
//! - Progress store outages

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use gobbler_core::{
    batch::BatchItem,
    progress::{ProgressStatus, ProgressStore, SqliteProgressStore},
    testing::{fixtures, FailingProgressStore, MockConverter},
    AdmissionDecision, AdmissionPolicy, BatchConfig, BatchProcessor, ConverterInvoker,
    ProgressTracker,
};

/// Test helper owning a file-backed progress store.
struct TestHarness {
    tracker: ProgressTracker,
    db_path: PathBuf,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("progress.db");
        let store = SqliteProgressStore::new(&db_path).expect("Failed to create progress store");
        let tracker = fixtures::spawn_tracker(Arc::new(store));

        Self {
            tracker,
            db_path,
            temp_dir,
        }
    }

    fn processor(&self, config: BatchConfig) -> BatchProcessor {
        BatchProcessor::new(config, self.tracker.clone())
    }

    /// A second connection, as another process would open it.
    fn reader(&self) -> SqliteProgressStore {
        SqliteProgressStore::new(&self.db_path).expect("Failed to open reader")
    }

    fn output_dir(&self) -> PathBuf {
        self.temp_dir.path().join("out")
    }
}

#[tokio::test]
async fn test_five_items_two_failures() {
    let harness = TestHarness::new();
    let converter = Arc::new(
        MockConverter::new()
            .with_delay(Duration::from_millis(20))
            .fail_on("https://example.com/2", "404 Not Found")
            .fail_on("https://example.com/4", "connection reset"),
    );
    let processor = harness
        .processor(BatchConfig::default().with_concurrency(2))
        .with_batch_id("five-items");

    let summary = processor
        .run(fixtures::url_items(5), Arc::clone(&converter) as Arc<dyn ConverterInvoker>)
        .await
        .unwrap();

    assert_eq!(summary.total_items, 5);
    assert_eq!(summary.successful, 3);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.results.len(), 5);

    let mut failed: Vec<&str> = summary.failures.iter().map(|f| f.source.as_str()).collect();
    failed.sort();
    assert_eq!(failed, vec!["https://example.com/2", "https://example.com/4"]);
    assert!(summary
        .failures
        .iter()
        .any(|f| f.error.contains("404 Not Found")));

    assert!(converter.max_concurrency() <= 2);

    let record = harness.reader().get("five-items").unwrap().unwrap();
    assert_eq!(record.status, ProgressStatus::Completed);
    assert_eq!(record.processed, 5);
    assert_eq!(record.successful, 3);
    assert_eq!(record.failed, 2);
    assert_eq!(record.errors.len(), 2);
    assert!(record.completed_at.is_some());
}

#[tokio::test]
async fn test_concurrency_high_water_mark() {
    let harness = TestHarness::new();
    let converter = Arc::new(MockConverter::new().with_delay(Duration::from_millis(100)));
    let processor = harness.processor(BatchConfig::default().with_concurrency(4));

    let summary = processor
        .run(fixtures::url_items(20), Arc::clone(&converter) as Arc<dyn ConverterInvoker>)
        .await
        .unwrap();

    assert_eq!(summary.successful, 20);
    assert_eq!(converter.call_count(), 20);
    // Saturated: exactly k in flight, never more.
    assert_eq!(converter.max_concurrency(), 4);
}

#[tokio::test]
async fn test_rerun_with_skip_existing_skips_everything() {
    let harness = TestHarness::new();
    let out = harness.output_dir();
    let items = || fixtures::url_items_with_outputs(4, &out);

    let first = Arc::new(MockConverter::new().writing_outputs());
    let summary = harness
        .processor(BatchConfig::default())
        .with_output_dir(&out)
        .run(items(), Arc::clone(&first) as Arc<dyn ConverterInvoker>)
        .await
        .unwrap();
    assert_eq!(summary.successful, 4);
    assert!(out.join("page_1.md").exists());

    let second = Arc::new(MockConverter::new().writing_outputs());
    let summary = harness
        .processor(BatchConfig::default().with_skip_existing(true))
        .with_output_dir(&out)
        .run(items(), Arc::clone(&second) as Arc<dyn ConverterInvoker>)
        .await
        .unwrap();

    assert_eq!(summary.skipped, summary.total_items);
    assert_eq!(summary.successful, 0);
    assert_eq!(second.call_count(), 0);
    assert!(summary
        .skipped_details
        .iter()
        .all(|s| s.reason == "File already exists"));
}

#[tokio::test]
async fn test_progress_is_monotone_for_observers() {
    let harness = TestHarness::new();
    let reader = harness.reader();
    let converter: Arc<dyn ConverterInvoker> =
        Arc::new(MockConverter::new().with_delay(Duration::from_millis(40)));
    let processor = harness
        .processor(BatchConfig::default().with_concurrency(2))
        .with_batch_id("monotone");

    let run = tokio::spawn(async move { processor.run(fixtures::url_items(6), converter).await });

    let mut seen = Vec::new();
    while !run.is_finished() {
        if let Some(record) = reader.get("monotone").unwrap() {
            assert_eq!(record.total, 6);
            assert!(record.processed <= record.total);
            assert_eq!(record.processed, record.successful + record.failed);
            seen.push(record.processed);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.successful, 6);

    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    let last = reader.get("monotone").unwrap().unwrap();
    assert_eq!(last.processed, 6);
    assert_eq!(last.status, ProgressStatus::Completed);
}

#[tokio::test]
async fn test_duplicate_names_are_suffixed_in_order() {
    let harness = TestHarness::new();
    let out = harness.output_dir();
    let items: Vec<BatchItem> = (1..=3)
        .map(|i| {
            BatchItem::new(i.to_string(), format!("https://example.com/same?page={}", i))
                .with_expected_output(out.join("same.md"))
        })
        .collect();

    let converter = Arc::new(MockConverter::new().writing_outputs());
    let summary = harness
        .processor(BatchConfig::default().with_concurrency(3))
        .with_output_dir(&out)
        .run(items, Arc::clone(&converter) as Arc<dyn ConverterInvoker>)
        .await
        .unwrap();
    assert_eq!(summary.successful, 3);

    let mut jobs = converter.recorded_jobs();
    jobs.sort_by(|a, b| a.item.id.cmp(&b.item.id));
    let outputs: Vec<PathBuf> = jobs.into_iter().filter_map(|j| j.output_path).collect();
    assert_eq!(
        outputs,
        vec![out.join("same.md"), out.join("same_1.md"), out.join("same_2.md")]
    );
    assert!(out.join("same_2.md").exists());
}

#[tokio::test]
async fn test_store_outage_degrades_but_completes() {
    let store = Arc::new(FailingProgressStore::new());
    let tracker = fixtures::spawn_tracker(Arc::clone(&store) as Arc<dyn ProgressStore>);
    let processor = BatchProcessor::new(BatchConfig::default(), tracker);

    let summary = processor
        .run(fixtures::url_items(3), Arc::new(MockConverter::new()))
        .await
        .unwrap();

    assert_eq!(summary.successful, 3);
    assert_eq!(summary.failed, 0);
    assert!(summary.progress_degraded);
    assert!(store.attempts() > 0);
    assert!(summary
        .format_report()
        .contains("Progress tracking was unavailable"));
}

#[test]
fn test_admission_scenarios() {
    let policy = AdmissionPolicy::default();

    assert_eq!(
        policy.decide(Some(Duration::from_secs(200)), 1, true),
        AdmissionDecision::Enqueue
    );
    assert_eq!(
        policy.decide(Some(Duration::from_secs(200)), 1, false),
        AdmissionDecision::Sync
    );
    assert_eq!(
        policy.decide(Some(Duration::from_secs(105)), 1, true),
        AdmissionDecision::Sync
    );
    assert_eq!(policy.decide(None, 11, true), AdmissionDecision::Enqueue);
    assert_eq!(policy.decide(None, 10, true), AdmissionDecision::Sync);
}
