#![doc = include_str!("../README.md")]

mod server;

use clap::Parser;
use provisioner_core::{MemoryStore, Provisioner, RequestStore, ShutdownReport, SledStore};
use server::config::{CliArgs, ServerConfig};
use server::service::handler::router;
use server::telemetry::init_telemetry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    init_telemetry(config.log_format)?;

    let store: Arc<dyn RequestStore> = match &config.database_path {
        Some(path) => {
            tracing::info!("Opening request store at {}", path.display());
            Arc::new(SledStore::open(path)?)
        }
        None => {
            tracing::warn!("No DATABASE_PATH set, requests are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };
    let provisioner = Provisioner::new(config.provisioner.clone(), store);

    let listener = TcpListener::bind(&config.server_addr).await?;
    log_startup_info(&config);

    axum::serve(listener, router(provisioner.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    match provisioner.shutdown().await {
        ShutdownReport::Abandoned { count } => {
            tracing::warn!("{count} requests left in started state")
        }
        ShutdownReport::Cancelled { count } => {
            tracing::warn!("{count} rounds cancelled before completion")
        }
        ShutdownReport::Idle | ShutdownReport::Drained => {}
    }

    tracing::info!("Service shut down successfully");
    Ok(())
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting provisioning service on {} with full config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting provisioning service on {} with {}ms worker delay",
            config.server_addr,
            config.provisioner.worker_delay.as_millis()
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                core::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = core::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            core::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
}
