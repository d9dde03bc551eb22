use thiserror::Error;

use crate::progress::StoreError;
use crate::queue::QueueError;

/// Errors that stop a batch as a whole.
///
/// Per-item problems never surface here; they are recorded as
/// `ConversionOutcome::Failure`.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The batch could not start (bad parameters, unusable output directory, ...).
    #[error("Batch setup failed: {0}")]
    Setup(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl From<crate::sources::SourceError> for BatchError {
    fn from(e: crate::sources::SourceError) -> Self {
        Self::Setup(e.to_string())
    }
}

impl From<crate::converter::ConverterError> for BatchError {
    fn from(e: crate::converter::ConverterError) -> Self {
        Self::Setup(e.to_string())
    }
}
