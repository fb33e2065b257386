//! Valix API
//!
//! HTTP front door and worker host for the credential validation service:
//! accepts submissions, runs permission probes through the job queue, and
//! delivers webhook notifications.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing::info;

use valix_orchestrator::{ValidationJobHandler, ValidationService, WebhookJobHandler};
use valix_probes::{AzureProviderFactory, ExecutorConfig, ProbeExecutor};
use valix_queue::{JobQueue, JobType, Worker, WorkerConfig};
use valix_webhooks::{SenderConfig, WebhookSender};

use valix_api::config::Config;
use valix_api::state::AppState;
use valix_api::{logging, router};

#[tokio::main]
async fn main() {
    // Fail fast on missing required configuration.
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.rust_log);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.host,
        port = config.port,
        cleanup_enabled = config.cleanup_enabled,
        "Starting valix API"
    );

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            info!("Database connection established");
            pool
        }
        Err(e) => {
            eprintln!("Failed to connect to database: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = valix_db::run_migrations(&pool).await {
        eprintln!("Failed to run database migrations: {e}");
        std::process::exit(1);
    }

    let queue = JobQueue::new(pool.clone());
    let service = ValidationService::new(pool.clone(), queue.clone())
        .with_validation_timeout(Duration::from_secs(config.validation_timeout_secs));

    let http = match reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to build HTTP client: {e}");
            std::process::exit(1);
        }
    };

    // Probe worker: runs the permission checks for queued validations.
    let executor = Arc::new(ProbeExecutor::new(
        Arc::new(AzureProviderFactory::new(http.clone())),
        ExecutorConfig {
            cleanup_enabled: config.cleanup_enabled,
            test_files_dir: config.test_files_dir.clone(),
        },
    ));
    let validation_worker = Arc::new(Worker::new(
        queue.clone(),
        JobType::Validation,
        Arc::new(ValidationJobHandler::new(
            pool.clone(),
            queue.clone(),
            executor,
        )),
        WorkerConfig::default(),
    ));

    // Webhook worker: drains queued notification jobs.
    let sender = WebhookSender::new(
        http,
        pool.clone(),
        SenderConfig {
            max_retries: config.webhook_retry_count,
            attempt_timeout: Duration::from_secs(config.webhook_timeout_secs),
            ..SenderConfig::default()
        },
    );
    let webhook_worker = Arc::new(Worker::new(
        queue.clone(),
        JobType::Webhook,
        Arc::new(WebhookJobHandler::new(pool.clone(), sender)),
        WorkerConfig::default(),
    ));

    let validation_task = {
        let worker = validation_worker.clone();
        tokio::spawn(async move {
            worker.run().await;
        })
    };
    let webhook_task = {
        let worker = webhook_worker.clone();
        tokio::spawn(async move {
            worker.run().await;
        })
    };
    info!("Queue workers started");

    let state = AppState::new(pool, service, config.api_key.clone());
    let app = router::build_router(state);

    let addr: SocketAddr = match config.bind_addr().parse() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("Invalid bind address '{}': {e}", config.bind_addr());
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to address {addr}: {e}");
            std::process::exit(1);
        }
    };

    info!(%addr, "Server listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }

    // Let in-flight jobs finish before the process exits.
    validation_worker.shutdown();
    webhook_worker.shutdown();
    if let Err(e) = validation_task.await {
        tracing::error!("Validation worker task panicked: {e}");
    }
    if let Err(e) = webhook_task.await {
        tracing::error!("Webhook worker task panicked: {e}");
    }
    info!("Server shutdown complete");
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
