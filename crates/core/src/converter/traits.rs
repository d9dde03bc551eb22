//! Trait definitions for the converter module.

use async_trait::async_trait;

use super::types::ConversionJob;
use crate::batch::ConversionOutcome;

/// Converts one item by delegating to an external engine.
///
/// Implementations report every failure as a `ConversionOutcome::Failure`;
/// panics are caught by the caller.
#[async_trait]
pub trait ConverterInvoker: Send + Sync {
    /// Returns the name of this invoker.
    fn name(&self) -> &str;

    /// Converts a single item.
    async fn invoke(&self, job: ConversionJob) -> ConversionOutcome;
}
