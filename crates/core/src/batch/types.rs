//! Types for the batch module.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Metadata key holding the planned output path of an item.
pub const EXPECTED_OUTPUT_KEY: &str = "expected_output";

/// One unit of work in a batch (a URL, a file path, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    /// Identifier, unique within the batch.
    pub id: String,
    /// What to convert: a URL or a file path.
    pub source: String,
    /// Free-form item metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl BatchItem {
    /// Creates an item with empty metadata.
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            metadata: Map::new(),
        }
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets the planned output path.
    pub fn with_expected_output(self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.with_metadata(EXPECTED_OUTPUT_KEY, path.to_string_lossy().to_string())
    }

    /// Planned output path, if the item carries one.
    pub fn expected_output(&self) -> Option<PathBuf> {
        self.metadata
            .get(EXPECTED_OUTPUT_KEY)
            .and_then(Value::as_str)
            .map(PathBuf::from)
    }
}

/// Why an item failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The converter reported an error.
    Conversion,
    /// The item exceeded its time budget.
    Timeout,
    /// The converter task panicked.
    Panicked,
    /// The result could not be written.
    Output,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conversion => "conversion",
            Self::Timeout => "timeout",
            Self::Panicked => "panicked",
            Self::Output => "output",
        }
    }
}

/// Terminal result of a single item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    /// Converted; `output_ref` points at the produced document.
    Success {
        output_ref: String,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    /// Conversion failed.
    Failure {
        error_kind: FailureKind,
        message: String,
    },
    /// Not attempted.
    Skipped { reason: String },
}

impl ConversionOutcome {
    pub fn success(output_ref: impl Into<String>) -> Self {
        Self::Success {
            output_ref: output_ref.into(),
            metadata: Map::new(),
        }
    }

    pub fn failure(error_kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            error_kind,
            message: message.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// Short label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Failure { .. } => "failure",
            Self::Skipped { .. } => "skipped",
        }
    }
}

/// Outcome of one item together with its timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    /// Item ID.
    pub item_id: String,
    /// Item source, kept for reporting.
    pub source: String,
    /// What happened.
    pub outcome: ConversionOutcome,
    /// Wall-clock time spent on the item in milliseconds.
    pub duration_ms: u64,
}
