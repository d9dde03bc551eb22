//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the converter and progress
//! store seams, allowing batch runs to be exercised without external engines.
//!
//! # Example
//!
//! ```rust,ignore
//! use gobbler_core::testing::{fixtures, MockConverter};
//!
//! let converter = MockConverter::new().fail_on("https://example.com/2", "404");
//! let summary = processor.run(fixtures::url_items(5), Arc::new(converter)).await?;
//! ```

mod failing_store;
mod mock_converter;

pub use failing_store::FailingProgressStore;
pub use mock_converter::MockConverter;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;
    use std::sync::Arc;

    use crate::batch::BatchItem;
    use crate::progress::{
        create_progress_system, ProgressConfig, ProgressStore, ProgressTracker,
        SqliteProgressStore,
    };

    /// Items `1..=n` with sources `https://example.com/{i}`.
    pub fn url_items(n: usize) -> Vec<BatchItem> {
        (1..=n)
            .map(|i| BatchItem::new(i.to_string(), format!("https://example.com/{}", i)))
            .collect()
    }

    /// Like [`url_items`], each planned to `dir/page_{i}.md`.
    pub fn url_items_with_outputs(n: usize, dir: &Path) -> Vec<BatchItem> {
        url_items(n)
            .into_iter()
            .map(|item| {
                let path = dir.join(format!("page_{}.md", item.id));
                item.with_expected_output(path)
            })
            .collect()
    }

    /// Tracker over `store` with its writer already spawned.
    pub fn spawn_tracker(store: Arc<dyn ProgressStore>) -> ProgressTracker {
        let (tracker, writer) = create_progress_system(store, &ProgressConfig::default());
        tokio::spawn(writer.run());
        tracker
    }

    /// Tracker over a fresh in-memory SQLite store.
    pub fn memory_tracker() -> ProgressTracker {
        let store = SqliteProgressStore::in_memory().expect("in-memory progress store");
        spawn_tracker(Arc::new(store))
    }
}
