pub mod admission;
pub mod batch;
pub mod config;
pub mod converter;
pub mod metrics;
pub mod progress;
pub mod queue;
pub mod service;
pub mod sources;
pub mod testing;

pub use admission::{Admission, AdmissionController, AdmissionDecision, AdmissionPolicy, Workload};
pub use batch::{
    BatchConfig, BatchError, BatchItem, BatchProcessor, BatchResult, BatchSummary, CancelHandle,
    ConversionOutcome, FailureKind, RetryConfig, SkipPolicy,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, QueueConfig,
    SanitizedConfig,
};
pub use converter::{
    ConversionJob, ConverterEndpoint, ConverterError, ConverterInvoker, ConverterKind,
    ConverterRegistry, HttpConverter,
};
pub use progress::{
    create_progress_system, ProgressConfig, ProgressRecord, ProgressStatus, ProgressStore,
    ProgressTracker, ProgressWriter, SqliteProgressStore, StoreError,
};
pub use queue::{
    EnqueueRequest, JobHandle, JobInfo, JobQueue, JobSource, JobStatus, JobWorker, QueueError,
    QueueName, SqliteJobQueue, TaskHandler, TaskRegistry,
};
pub use service::{BatchJob, BatchRequest, BatchService, BatchSource, BatchTask, Submission};
pub use sources::SourceError;
