use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use gobbler_core::{
    create_progress_system, load_config, validate_config, AdmissionController, BatchService,
    ConverterRegistry, JobQueue, ProgressStore, SqliteJobQueue, SqliteProgressStore,
};
use gobbler_server::{api::create_router, shutdown::shutdown_signal, state::AppState, telemetry};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    telemetry::init_tracing();

    // Determine config path
    let config_path = std::env::var("GOBBLER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;
    info!("Configuration hash: {}", telemetry::config_fingerprint(&config));

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);

    // Progress records are shared with the worker through the database file
    let progress_store: Arc<dyn ProgressStore> = Arc::new(
        SqliteProgressStore::new(&config.database.path)
            .context("Failed to create progress store")?,
    );
    let (tracker, progress_writer) = create_progress_system(progress_store, &config.progress);
    let writer_handle = tokio::spawn(progress_writer.run());
    info!("Progress writer started");

    let job_queue: Arc<dyn JobQueue> = Arc::new(
        SqliteJobQueue::new(&config.database.path).context("Failed to create job queue")?,
    );
    info!("Job queue initialized");

    let converters = ConverterRegistry::from_config(&config.converters)
        .context("Failed to create converters")?;
    info!("Converters configured: {:?}", converters.kinds());

    let service = Arc::new(BatchService::new(
        config.batch.clone(),
        AdmissionController::new(config.admission.clone()),
        converters,
        tracker,
        job_queue,
    ));

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), service));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The router owned the last tracker, so the writer drains and exits
    info!("Server shutting down...");
    let _ = writer_handle.await;
    info!("Progress writer stopped");

    Ok(())
}
