//! Background job queue.
//!
//! Producers call [`JobQueue::enqueue`]; a [`JobWorker`], usually in a
//! separate process sharing the same database, claims jobs through
//! [`JobSource`] and dispatches them to [`TaskHandler`]s by task name.

mod error;
mod sqlite;
mod traits;
mod types;
mod worker;

pub use error::QueueError;
pub use sqlite::SqliteJobQueue;
pub use traits::{JobQueue, JobSource, TaskHandler, TaskRegistry};
pub use types::{ClaimedJob, EnqueueRequest, JobHandle, JobInfo, JobStatus, QueueName};
pub use worker::JobWorker;
