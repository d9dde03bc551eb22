//! Skip policy and cancellation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::types::BatchItem;

/// Reason recorded for items whose output is already on disk.
pub const OUTPUT_EXISTS_REASON: &str = "File already exists";

/// Reason recorded for items dropped by cancellation.
pub const CANCELLED_REASON: &str = "batch cancelled";

type SkipFn = dyn Fn(&BatchItem) -> Option<String> + Send + Sync;

/// Decides, per item, whether to skip it without invoking the converter.
#[derive(Clone, Default)]
pub enum SkipPolicy {
    /// Process everything.
    #[default]
    Never,
    /// Skip items whose `expected_output` already exists.
    OutputExists,
    /// Skip when the closure returns a reason.
    Custom(Arc<SkipFn>),
}

impl SkipPolicy {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&BatchItem) -> Option<String> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Returns the skip reason, or `None` to process the item.
    pub fn check(&self, item: &BatchItem) -> Option<String> {
        match self {
            Self::Never => None,
            Self::OutputExists => item
                .expected_output()
                .filter(|path| path.exists())
                .map(|_| OUTPUT_EXISTS_REASON.to_string()),
            Self::Custom(f) => f(item),
        }
    }
}

impl fmt::Debug for SkipPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => f.write_str("Never"),
            Self::OutputExists => f.write_str("OutputExists"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Stops a running batch from starting new items.
///
/// Items already converting are allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
