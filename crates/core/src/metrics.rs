//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Batches (sync vs queued admission, per-item outcomes and durations)
//! - The background job queue
//! - The progress store

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Batch Metrics
// =============================================================================

/// Batches submitted, by how they were run.
pub static BATCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gobbler_batches_total", "Total batches submitted"),
        &["mode"], // "sync", "queued"
    )
    .unwrap()
});

/// Batch items by terminal outcome.
pub static BATCH_ITEMS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gobbler_batch_items_total", "Total batch items processed"),
        &["outcome"], // "success", "failure", "skipped"
    )
    .unwrap()
});

/// Time spent on one item, retries included.
pub static ITEM_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "gobbler_item_duration_seconds",
            "Duration of a batch item including retries",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["outcome"],
    )
    .unwrap()
});

// =============================================================================
// Queue Metrics
// =============================================================================

/// Job state transitions by queue.
pub static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gobbler_jobs_total", "Total background job transitions"),
        &["queue", "status"], // status: "queued", "finished", "failed"
    )
    .unwrap()
});

// =============================================================================
// Progress Metrics
// =============================================================================

/// Progress store writes or reads that failed.
pub static PROGRESS_STORE_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "gobbler_progress_store_errors_total",
        "Total progress store operations that failed",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Batches
        Box::new(BATCHES_TOTAL.clone()),
        Box::new(BATCH_ITEMS.clone()),
        Box::new(ITEM_DURATION.clone()),
        // Queue
        Box::new(JOBS_TOTAL.clone()),
        // Progress
        Box::new(PROGRESS_STORE_ERRORS.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        BATCH_ITEMS.with_label_values(&["success"]).inc();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"gobbler_batch_items_total".to_string()));
    }
}
