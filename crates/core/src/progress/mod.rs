//! Batch progress tracking.
//!
//! Item tasks report through a cloneable [`ProgressTracker`]; a single
//! [`ProgressWriter`] task applies the mutations and persists them to a
//! [`ProgressStore`].

mod config;
mod sqlite;
mod store;
mod tracker;
mod types;
mod writer;

pub use config::ProgressConfig;
pub use sqlite::SqliteProgressStore;
pub use store::{ProgressStore, StoreError};
pub use tracker::ProgressTracker;
pub use types::{ProgressError, ProgressRecord, ProgressStatus, ProgressUpdate};
pub use writer::{create_progress_system, ProgressCommand, ProgressWriter};
