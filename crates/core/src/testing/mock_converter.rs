//! Mock converter for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::batch::{ConversionOutcome, FailureKind};
use crate::converter::{ConversionJob, ConverterInvoker};

/// Mock implementation of the ConverterInvoker trait.
///
/// Provides controllable behavior for testing:
/// - Per-source failures, panics, skips and delays
/// - Failures for the first N attempts of a source
/// - Recorded jobs and a concurrency high-water mark
///
/// # Example
///
/// ```rust,ignore
/// use gobbler_core::testing::MockConverter;
///
/// let converter = MockConverter::new()
///     .with_delay(Duration::from_millis(20))
///     .fail_on("https://example.com/2", "404 Not Found");
///
/// let summary = processor.run(items, Arc::new(converter)).await?;
/// ```
#[derive(Debug, Default)]
pub struct MockConverter {
    delay: Duration,
    delays: HashMap<String, Duration>,
    failures: HashMap<String, String>,
    transient: HashMap<String, u32>,
    panics: HashSet<String>,
    skips: HashMap<String, String>,
    write_outputs: bool,
    jobs: Mutex<Vec<ConversionJob>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl MockConverter {
    /// Create a mock that converts everything instantly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied to every invocation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Delay applied to one source, overriding the default delay.
    pub fn with_delay_for(mut self, source: &str, delay: Duration) -> Self {
        self.delays.insert(source.to_string(), delay);
        self
    }

    /// Always fail `source` with `message`.
    pub fn fail_on(mut self, source: &str, message: &str) -> Self {
        self.failures.insert(source.to_string(), message.to_string());
        self
    }

    /// Fail the first `times` attempts of `source`, then succeed.
    pub fn fail_times(mut self, source: &str, times: u32) -> Self {
        self.transient.insert(source.to_string(), times);
        self
    }

    /// Panic while converting `source`.
    pub fn panic_on(mut self, source: &str) -> Self {
        self.panics.insert(source.to_string());
        self
    }

    /// Report `source` as skipped.
    pub fn skip_on(mut self, source: &str, reason: &str) -> Self {
        self.skips.insert(source.to_string(), reason.to_string());
        self
    }

    /// Write a small markdown file to each job's output path on success.
    pub fn writing_outputs(mut self) -> Self {
        self.write_outputs = true;
        self
    }

    /// Every job received, in arrival order.
    pub fn recorded_jobs(&self) -> Vec<ConversionJob> {
        self.jobs.lock().map(|jobs| jobs.clone()).unwrap_or_default()
    }

    /// Total number of invocations.
    pub fn call_count(&self) -> usize {
        self.jobs.lock().map(|jobs| jobs.len()).unwrap_or(0)
    }

    /// Number of invocations for one source.
    pub fn calls_for(&self, source: &str) -> usize {
        self.jobs
            .lock()
            .map(|jobs| jobs.iter().filter(|j| j.item.source == source).count())
            .unwrap_or(0)
    }

    /// Highest number of invocations observed running at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

/// Decrements the active counter even when the invocation is aborted.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConverterInvoker for MockConverter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, job: ConversionJob) -> ConversionOutcome {
        let source = job.item.source.clone();
        let attempt = job.attempt;
        let output_path = job.output_path.clone();
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.push(job);
        }

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = ActiveGuard(&self.active);
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let delay = self.delays.get(&source).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.panics.contains(&source) {
            panic!("mock panic for {}", source);
        }
        if let Some(message) = self.failures.get(&source) {
            return ConversionOutcome::failure(FailureKind::Conversion, message.clone());
        }
        if let Some(times) = self.transient.get(&source) {
            if attempt <= *times {
                return ConversionOutcome::failure(
                    FailureKind::Conversion,
                    format!("transient failure on attempt {}", attempt),
                );
            }
        }
        if let Some(reason) = self.skips.get(&source) {
            return ConversionOutcome::skipped(reason.clone());
        }

        match output_path {
            Some(path) => {
                if self.write_outputs {
                    if let Err(e) = tokio::fs::write(&path, format!("# {}\n", source)).await {
                        return ConversionOutcome::failure(FailureKind::Output, e.to_string());
                    }
                }
                ConversionOutcome::success(path.to_string_lossy().to_string())
            }
            None => ConversionOutcome::success(format!("mock://{}", source)),
        }
    }
}
