use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{info, warn};

mod api;
mod config;
mod error;
mod jobs;
mod pipeline;
mod service;
mod storage;

use crate::config::RuntimeConfig;
use crate::service::LightscanService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!("Starting Lightscan service v{}", env!("CARGO_PKG_VERSION"));

    // Static config + pipeline config (with persisted overrides)
    let runtime_config = Arc::new(RuntimeConfig::load()?);
    info!(
        host = %runtime_config.static_config.server.host,
        port = runtime_config.static_config.server.port,
        workers = runtime_config.static_config.workers.count,
        "Configuration loaded"
    );

    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Prometheus recorder unavailable, /metrics will be empty");
            None
        }
    };

    // Initialize the service (creates storage directories)
    let service = Arc::new(LightscanService::new(runtime_config.clone())?);

    match service.restore_completed_jobs() {
        Ok(count) if count > 0 => info!(count, "Restored completed jobs"),
        Err(e) => warn!(error = %e, "Restoring saved results failed"),
        _ => {}
    }

    let workers = LightscanService::start_job_workers(service.clone());

    let app = api::router(service.clone(), metrics);

    // Start the server
    let addr = format!(
        "{}:{}",
        runtime_config.static_config.server.host, runtime_config.static_config.server.port
    );
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(service.clone()))
        .await?;

    for worker in workers {
        if let Err(e) = worker.await {
            warn!(error = %e, "Job worker ended abnormally");
        }
    }
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal(service: Arc<LightscanService>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
    service.shutdown();
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lightscan_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
