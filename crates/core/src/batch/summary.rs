//! Batch summary and report rendering.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Write;
use std::path::PathBuf;
use std::time::Duration;

use super::types::{BatchResult, ConversionOutcome, FailureKind};

/// A successfully converted item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessDetail {
    pub source: String,
    pub output_ref: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A failed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub source: String,
    pub kind: FailureKind,
    pub error: String,
}

/// A skipped item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedDetail {
    pub source: String,
    pub reason: String,
}

/// Final report of a batch run, computed once after every item resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub operation: String,
    pub total_items: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    pub processing_time_ms: u64,
    pub success_details: Vec<SuccessDetail>,
    pub failures: Vec<FailureDetail>,
    pub skipped_details: Vec<SkippedDetail>,
    /// Set when progress could not be persisted for part of the run.
    #[serde(default)]
    pub progress_degraded: bool,
    /// One entry per item, in submission order.
    #[serde(default)]
    pub results: Vec<BatchResult>,
}

impl BatchSummary {
    /// Summary of a batch with no items.
    pub fn empty(batch_id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::from_results(batch_id, operation, None, Vec::new(), Duration::ZERO, false)
    }

    /// Builds the summary from the per-item results.
    pub fn from_results(
        batch_id: impl Into<String>,
        operation: impl Into<String>,
        output_dir: Option<PathBuf>,
        results: Vec<BatchResult>,
        elapsed: Duration,
        progress_degraded: bool,
    ) -> Self {
        let mut success_details = Vec::new();
        let mut failures = Vec::new();
        let mut skipped_details = Vec::new();

        for result in &results {
            match &result.outcome {
                ConversionOutcome::Success {
                    output_ref,
                    metadata,
                } => success_details.push(SuccessDetail {
                    source: result.source.clone(),
                    output_ref: output_ref.clone(),
                    metadata: metadata.clone(),
                }),
                ConversionOutcome::Failure {
                    error_kind,
                    message,
                } => failures.push(FailureDetail {
                    source: result.source.clone(),
                    kind: *error_kind,
                    error: message.clone(),
                }),
                ConversionOutcome::Skipped { reason } => skipped_details.push(SkippedDetail {
                    source: result.source.clone(),
                    reason: reason.clone(),
                }),
            }
        }

        Self {
            batch_id: batch_id.into(),
            operation: operation.into(),
            total_items: results.len(),
            successful: success_details.len(),
            failed: failures.len(),
            skipped: skipped_details.len(),
            output_dir,
            processing_time_ms: elapsed.as_millis() as u64,
            success_details,
            failures,
            skipped_details,
            progress_degraded,
            results,
        }
    }

    /// Percentage of items that converted successfully.
    pub fn success_rate(&self) -> f64 {
        if self.total_items == 0 {
            return 0.0;
        }
        self.successful as f64 / self.total_items as f64 * 100.0
    }

    /// Renders the summary as a markdown report.
    pub fn format_report(&self) -> String {
        let mut out = String::new();
        let status = if self.failed == 0 {
            "Completed"
        } else {
            "Completed with errors"
        };

        let _ = writeln!(out, "# Batch Operation Summary\n");
        let _ = writeln!(out, "**Batch ID:** {}", self.batch_id);
        let _ = writeln!(out, "**Status:** {}\n", status);
        let _ = writeln!(out, "## Statistics");
        let _ = writeln!(out, "- **Total Items:** {}", self.total_items);
        let _ = writeln!(
            out,
            "- **Successful:** {} ({:.1}%)",
            self.successful,
            self.success_rate()
        );
        let _ = writeln!(out, "- **Failed:** {}", self.failed);
        let _ = writeln!(out, "- **Skipped:** {}", self.skipped);
        let _ = writeln!(
            out,
            "- **Processing Time:** {}\n",
            format_elapsed(self.processing_time_ms)
        );

        if self.progress_degraded {
            let _ = writeln!(
                out,
                "> Progress tracking was unavailable for part of this run.\n"
            );
        }

        if !self.success_details.is_empty() {
            let _ = writeln!(out, "## Successful Items");
            for (i, item) in self.success_details.iter().enumerate() {
                let words = item
                    .metadata
                    .get("word_count")
                    .and_then(Value::as_u64)
                    .map(|n| format!(" ({} words)", n))
                    .unwrap_or_default();
                let _ = writeln!(
                    out,
                    "{}. {} -> {}{}",
                    i + 1,
                    item.source,
                    item.output_ref,
                    words
                );
            }
            out.push('\n');
        }

        if !self.failures.is_empty() {
            let _ = writeln!(out, "## Failed Items");
            for (i, item) in self.failures.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{}. {} - [{}] {}",
                    i + 1,
                    item.source,
                    item.kind.as_str(),
                    item.error
                );
            }
            out.push('\n');
        }

        if !self.skipped_details.is_empty() {
            let _ = writeln!(out, "## Skipped Items");
            for (i, item) in self.skipped_details.iter().enumerate() {
                let _ = writeln!(out, "{}. {} - {}", i + 1, item.source, item.reason);
            }
            out.push('\n');
        }

        if let Some(dir) = &self.output_dir {
            let _ = writeln!(out, "## Output Location");
            let _ = writeln!(out, "All files saved to: {}", dir.display());
        }

        out
    }
}

fn format_elapsed(ms: u64) -> String {
    let total_secs = ms / 1000;
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
