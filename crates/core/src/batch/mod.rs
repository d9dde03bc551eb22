//! Batch orchestration.
//!
//! [`BatchProcessor`] fans a list of [`BatchItem`]s out to a converter with
//! bounded concurrency and collects one [`BatchResult`] per item into a
//! [`BatchSummary`].
//!
//! # Architecture
//!
//! ```text
//! items -> OutputPlanner -> [semaphore-bounded item tasks] -> BatchSummary
//!                                 |
//!                                 +-> SkipPolicy / Pacer / retries / timeout
//!                                 +-> ProgressTracker (single writer)
//! ```

mod config;
mod error;
mod planner;
mod policy;
mod processor;
mod summary;
mod types;

pub use config::{BatchConfig, RetryConfig};
pub use error::BatchError;
pub use planner::{suffixed, OutputPlanner};
pub use policy::{CancelHandle, SkipPolicy, CANCELLED_REASON, OUTPUT_EXISTS_REASON};
pub use processor::BatchProcessor;
pub use summary::{BatchSummary, FailureDetail, SkippedDetail, SuccessDetail};
pub use types::{BatchItem, BatchResult, ConversionOutcome, FailureKind, EXPECTED_OUTPUT_KEY};
