//! Background worker: runs queued batches out of the server process.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info};

use gobbler_core::{
    create_progress_system, load_config, validate_config, AdmissionController, BatchService,
    BatchTask, ConverterRegistry, JobQueue, JobSource, JobWorker, ProgressStore, SqliteJobQueue,
    SqliteProgressStore, TaskRegistry,
};
use gobbler_server::{shutdown::shutdown_signal, telemetry};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    telemetry::init_tracing();

    let config_path = std::env::var("GOBBLER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;
    info!("Configuration hash: {}", telemetry::config_fingerprint(&config));

    let progress_store: Arc<dyn ProgressStore> = Arc::new(
        SqliteProgressStore::new(&config.database.path)
            .context("Failed to create progress store")?,
    );
    let (tracker, progress_writer) = create_progress_system(progress_store, &config.progress);
    let writer_handle = tokio::spawn(progress_writer.run());

    let queue = Arc::new(
        SqliteJobQueue::new(&config.database.path).context("Failed to create job queue")?,
    );

    let converters = ConverterRegistry::from_config(&config.converters)
        .context("Failed to create converters")?;
    info!("Converters configured: {:?}", converters.kinds());

    let service = Arc::new(BatchService::new(
        config.batch.clone(),
        AdmissionController::new(config.admission.clone()),
        converters,
        tracker,
        Arc::clone(&queue) as Arc<dyn JobQueue>,
    ));

    let tasks = TaskRegistry::new().with(Arc::new(BatchTask::new(service)));
    let worker = JobWorker::new(
        queue as Arc<dyn JobSource>,
        tasks,
        config.queue.queues.clone(),
    )
    .with_poll_interval(config.queue.poll_interval());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));
    info!("Worker listening on {:?}", config.queue.queues);

    shutdown_signal().await;
    info!("Worker shutting down...");
    let _ = shutdown_tx.send(true);

    // A job in flight is finished before the worker exits
    match worker_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Worker stopped with error: {}", e),
        Err(e) => error!("Worker task failed: {}", e),
    }

    let _ = writer_handle.await;
    info!("Progress writer stopped");

    Ok(())
}
