//! Error types for the converter module.

use std::path::PathBuf;
use thiserror::Error;

use super::types::ConverterKind;
use crate::batch::{ConversionOutcome, FailureKind};

/// Errors that can occur during conversion.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// No engine configured for the requested kind.
    #[error("No converter configured for kind: {kind}")]
    NotConfigured { kind: ConverterKind },

    /// Endpoint configuration is unusable.
    #[error("Invalid converter endpoint: {reason}")]
    InvalidEndpoint { reason: String },

    /// The engine could not be reached.
    #[error("Request to converter failed: {0}")]
    Request(String),

    /// The engine did not answer in time.
    #[error("Converter request timed out")]
    Timeout,

    /// The engine answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The engine's answer could not be parsed.
    #[error("Invalid converter response: {0}")]
    InvalidResponse(String),

    /// The converted document could not be written.
    #[error("Failed to write output {path}: {reason}")]
    Output { path: PathBuf, reason: String },
}

impl ConverterError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_) | Self::Timeout => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Per-item outcome describing this error.
    pub fn into_outcome(self) -> ConversionOutcome {
        let kind = match &self {
            Self::Output { .. } => FailureKind::Output,
            Self::Timeout => FailureKind::Timeout,
            _ => FailureKind::Conversion,
        };
        ConversionOutcome::failure(kind, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_outcome_kinds() {
        let outcome = ConverterError::Output {
            path: PathBuf::from("/ro/out.md"),
            reason: "read-only file system".to_string(),
        }
        .into_outcome();
        assert!(matches!(
            outcome,
            ConversionOutcome::Failure {
                error_kind: FailureKind::Output,
                ..
            }
        ));

        let outcome = ConverterError::Status {
            status: 404,
            body: "not found".to_string(),
        }
        .into_outcome();
        match outcome {
            ConversionOutcome::Failure { error_kind, message } => {
                assert_eq!(error_kind, FailureKind::Conversion);
                assert_eq!(message, "HTTP 404: not found");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_retryable() {
        assert!(ConverterError::Timeout.is_retryable());
        assert!(ConverterError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(!ConverterError::Status { status: 400, body: String::new() }.is_retryable());
        assert!(!ConverterError::InvalidResponse("x".into()).is_retryable());
    }
}
