//! Batch submission payloads.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::batch::{BatchConfig, BatchItem};
use crate::converter::ConverterKind;
use crate::sources::{self, scan_directory, FileClass, SourceError};

/// Where a batch's items come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchSource {
    /// Explicit URL list, processed in the given order.
    Urls(Vec<String>),
    /// Files found by scanning a directory.
    Directory(DirectorySource),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectorySource {
    pub path: PathBuf,
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default)]
    pub recursive: bool,
}

fn default_pattern() -> String {
    "*".to_string()
}

/// A request to convert a set of items of one kind.
///
/// Optional fields override the service's [`BatchConfig`] for this batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub kind: ConverterKind,
    #[serde(flatten)]
    pub source: BatchSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_existing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl BatchRequest {
    pub fn urls(kind: ConverterKind, urls: Vec<String>) -> Self {
        Self::new(kind, BatchSource::Urls(urls))
    }

    pub fn directory(kind: ConverterKind, path: impl Into<PathBuf>) -> Self {
        Self::new(
            kind,
            BatchSource::Directory(DirectorySource {
                path: path.into(),
                pattern: default_pattern(),
                recursive: false,
            }),
        )
    }

    fn new(kind: ConverterKind, source: BatchSource) -> Self {
        Self {
            kind,
            source,
            output_dir: None,
            concurrency: None,
            skip_existing: None,
            timeout_secs: None,
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn with_skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = Some(skip);
        self
    }

    /// Resolves the source into ordered items with planned outputs.
    pub fn resolve_items(&self) -> Result<Vec<BatchItem>, SourceError> {
        let output_dir = self.output_dir.as_deref();
        match &self.source {
            BatchSource::Urls(urls) => sources::items_from_urls(self.kind, urls, output_dir),
            BatchSource::Directory(dir) => {
                let class = match self.kind {
                    ConverterKind::Audio => FileClass::Audio,
                    ConverterKind::Document => FileClass::Document,
                    other => {
                        return Err(SourceError::Unsupported(format!(
                            "{} batches take URLs, not a directory",
                            other
                        )))
                    }
                };
                let files = scan_directory(&dir.path, &dir.pattern, dir.recursive, class)?;
                if files.is_empty() {
                    return Err(SourceError::Empty);
                }
                Ok(sources::items_from_files(&files, output_dir))
            }
        }
    }

    /// `base` with this request's overrides applied.
    pub fn batch_config(&self, base: &BatchConfig) -> BatchConfig {
        let mut config = base.clone();
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(skip) = self.skip_existing {
            config.skip_existing = skip;
        }
        if let Some(secs) = self.timeout_secs {
            config.item_timeout_secs = secs.max(1);
        }
        config
    }
}

/// Queue payload of a batch deferred to the worker.
///
/// Items are resolved at submission so the worker runs exactly what the
/// submitter validated and the batch id handed to the client stays valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub batch_id: String,
    pub request: BatchRequest,
    pub items: Vec<BatchItem>,
}
