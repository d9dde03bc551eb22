//! Progress record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Lifecycle of a batch as seen by progress readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Running,
    Completed,
    Failed,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// One entry of the bounded error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Shared status document of one batch.
///
/// `processed` counts items that reached success or failure; skipped items
/// are counted in `skipped` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub batch_id: String,
    pub operation: String,
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_item: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ProgressStatus,
    #[serde(default)]
    pub errors: Vec<ProgressError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A mutation of a progress record.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    CurrentItem(String),
    Success,
    Failure {
        message: String,
        item: Option<String>,
    },
    Skipped {
        reason: String,
        item: Option<String>,
    },
    Complete,
    Fail(String),
}

impl ProgressRecord {
    /// Fresh running record.
    pub fn new(batch_id: impl Into<String>, total: usize, operation: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            operation: operation.into(),
            total,
            processed: 0,
            successful: 0,
            failed: 0,
            skipped: 0,
            current_item: None,
            started_at: Utc::now(),
            completed_at: None,
            status: ProgressStatus::Running,
            errors: Vec::new(),
            error: None,
        }
    }

    /// Items that reached any terminal outcome.
    pub fn settled(&self) -> usize {
        self.processed + self.skipped
    }

    /// Completion percentage in `[0, 100]`.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.settled().min(self.total) as f64 / self.total as f64) * 100.0
    }

    /// Applies one mutation. Errors beyond `max_errors` drop the oldest entries.
    pub fn apply(&mut self, update: ProgressUpdate, max_errors: usize) {
        let now = Utc::now();
        match update {
            ProgressUpdate::CurrentItem(label) => {
                self.current_item = Some(label);
            }
            ProgressUpdate::Success => {
                self.successful += 1;
                self.processed += 1;
            }
            ProgressUpdate::Failure { message, item } => {
                self.failed += 1;
                self.processed += 1;
                self.errors.push(ProgressError {
                    message,
                    item,
                    timestamp: now,
                });
                if self.errors.len() > max_errors {
                    let excess = self.errors.len() - max_errors;
                    self.errors.drain(..excess);
                }
            }
            ProgressUpdate::Skipped { .. } => {
                self.skipped += 1;
            }
            ProgressUpdate::Complete => {
                if self.status == ProgressStatus::Running {
                    self.status = ProgressStatus::Completed;
                }
                self.current_item = None;
                self.completed_at = Some(now);
            }
            ProgressUpdate::Fail(error) => {
                self.status = ProgressStatus::Failed;
                self.current_item = None;
                self.completed_at = Some(now);
                self.error = Some(error);
            }
        }
    }

    /// Renders the record as a markdown report.
    pub fn format_report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Batch Progress Report\n");
        let _ = writeln!(out, "**Batch ID:** {}", self.batch_id);
        let _ = writeln!(out, "**Operation:** {}", self.operation);
        let _ = writeln!(out, "**Status:** {}\n", self.status.as_str().to_uppercase());
        let _ = writeln!(out, "## Progress");
        let _ = writeln!(out, "- **Processed:** {}/{}", self.processed, self.total);
        let _ = writeln!(out, "- **Successful:** {}", self.successful);
        let _ = writeln!(out, "- **Failed:** {}", self.failed);
        let _ = writeln!(out, "- **Skipped:** {}", self.skipped);

        if self.status == ProgressStatus::Running {
            let current = self.current_item.as_deref().unwrap_or("N/A");
            let _ = writeln!(out, "- **Current Item:** {}", current);
            let _ = writeln!(out, "- **Progress:** {:.1}%", self.percent());
        }

        if let Some(error) = &self.error {
            let _ = writeln!(out, "\n**Error:** {}", error);
        }

        if !self.errors.is_empty() {
            let _ = writeln!(out, "\n## Recent Errors");
            let start = self.errors.len().saturating_sub(5);
            for entry in &self.errors[start..] {
                match &entry.item {
                    Some(item) => {
                        let _ = writeln!(out, "- {}: {}", item, entry.message);
                    }
                    None => {
                        let _ = writeln!(out, "- {}", entry.message);
                    }
                }
            }
        }

        let _ = writeln!(out, "\n**Started:** {}", self.started_at.to_rfc3339());
        if let Some(completed) = self.completed_at {
            let _ = writeln!(out, "**Completed:** {}", completed.to_rfc3339());
        }

        out
    }
}
