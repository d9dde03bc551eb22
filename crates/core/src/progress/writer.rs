use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::{ProgressConfig, ProgressRecord, ProgressStore, ProgressTracker, ProgressUpdate};
use crate::metrics;

/// Message consumed by the [`ProgressWriter`].
#[derive(Debug)]
pub enum ProgressCommand {
    Initialize {
        batch_id: String,
        total: usize,
        operation: String,
        /// Keep the record in memory; false when another process runs the batch.
        cache: bool,
    },
    Update {
        batch_id: String,
        update: ProgressUpdate,
    },
    /// Acknowledged once every earlier command has been applied.
    Flush(oneshot::Sender<()>),
}

/// Batch IDs whose progress could not be persisted.
pub(crate) type DegradedSet = Arc<Mutex<HashSet<String>>>;

/// Background task owning every progress read-modify-write.
///
/// Being the only writer, it keeps the live records in memory and persists
/// each mutation, so concurrent item tasks never overwrite each other.
pub struct ProgressWriter {
    rx: mpsc::Receiver<ProgressCommand>,
    store: Arc<dyn ProgressStore>,
    ttl: Duration,
    max_errors: usize,
    records: HashMap<String, ProgressRecord>,
    degraded: DegradedSet,
}

impl ProgressWriter {
    pub(crate) fn new(
        rx: mpsc::Receiver<ProgressCommand>,
        store: Arc<dyn ProgressStore>,
        config: &ProgressConfig,
        degraded: DegradedSet,
    ) -> Self {
        Self {
            rx,
            store,
            ttl: config.ttl(),
            max_errors: config.max_errors,
            records: HashMap::new(),
            degraded,
        }
    }

    /// Run the writer, consuming commands until every tracker is dropped
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        tracing::info!("Progress writer started");

        while let Some(command) = self.rx.recv().await {
            match command {
                ProgressCommand::Initialize {
                    batch_id,
                    total,
                    operation,
                    cache,
                } => self.initialize(batch_id, total, operation, cache),
                ProgressCommand::Update { batch_id, update } => self.update(batch_id, update),
                ProgressCommand::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }

        tracing::info!("Progress writer shutting down");
    }

    fn initialize(&mut self, batch_id: String, total: usize, operation: String, cache: bool) {
        match self.store.purge_expired() {
            Ok(0) => {}
            Ok(purged) => tracing::debug!(purged, "Purged expired progress records"),
            Err(e) => tracing::debug!(error = %e, "Failed to purge expired progress records"),
        }

        let record = ProgressRecord::new(batch_id.clone(), total, operation);
        self.persist(&record);
        if cache {
            self.records.insert(batch_id, record);
        }
    }

    fn update(&mut self, batch_id: String, update: ProgressUpdate) {
        let terminal = matches!(update, ProgressUpdate::Complete | ProgressUpdate::Fail(_));

        let mut record = match self.records.remove(&batch_id) {
            Some(record) => record,
            None => match self.store.get(&batch_id) {
                Ok(Some(record)) => record,
                Ok(None) if matches!(update, ProgressUpdate::Fail(_)) => {
                    ProgressRecord::new(batch_id.clone(), 0, "batch")
                }
                Ok(None) => {
                    tracing::warn!(batch_id = %batch_id, "Progress update for unknown batch");
                    return;
                }
                Err(e) => {
                    self.degrade(&batch_id, &e);
                    return;
                }
            },
        };

        record.apply(update, self.max_errors);
        self.persist(&record);

        if !terminal {
            self.records.insert(batch_id, record);
        }
    }

    fn persist(&self, record: &ProgressRecord) {
        if let Err(e) = self.store.put(record, self.ttl) {
            self.degrade(&record.batch_id, &e);
        }
    }

    fn degrade(&self, batch_id: &str, error: &dyn std::fmt::Display) {
        tracing::warn!(batch_id = %batch_id, error = %error, "Failed to persist batch progress");
        metrics::PROGRESS_STORE_ERRORS.inc();
        if let Ok(mut degraded) = self.degraded.lock() {
            degraded.insert(batch_id.to_string());
        }
    }
}

/// Create a complete progress system
///
/// Returns:
/// - `ProgressTracker` - for emitting updates (clone this to share across tasks)
/// - `ProgressWriter` - spawn this as a background task with `tokio::spawn(writer.run())`
pub fn create_progress_system(
    store: Arc<dyn ProgressStore>,
    config: &ProgressConfig,
) -> (ProgressTracker, ProgressWriter) {
    let (tx, rx) = mpsc::channel(config.buffer_size.max(1));
    let degraded: DegradedSet = Arc::new(Mutex::new(HashSet::new()));
    let tracker = ProgressTracker::new(tx, Arc::clone(&store), Arc::clone(&degraded));
    let writer = ProgressWriter::new(rx, store, config, degraded);
    (tracker, writer)
}
