//! QuillKV server entry point.
//!
//! Sets up logging, the database registry and the TCP listener, then serves
//! clients until Ctrl+C.

use clap::Parser;
use quillkv::commands::CommandHandler;
use quillkv::config::Config;
use quillkv::connection::{handle_connection, ConnectionStats};
use quillkv::storage::Databases;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "quillkv=info".into()),
        )
        .with_target(false)
        .init();

    let databases = Arc::new(Databases::new(config.databases_config()));

    if let Some(path) = &config.load {
        match databases.selected().load_snapshot(path) {
            Ok(keys) => info!(keys, path = %path.display(), "Preloaded snapshot into db 0"),
            Err(e) => warn!(path = %path.display(), error = %e, "Could not preload snapshot, starting empty"),
        }
    }

    databases.start_sweeper();
    info!(
        interval_ms = config.sweep_interval_ms,
        "Background expiry sweeper started"
    );

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(
        version = quillkv::VERSION,
        addr = %config.bind_address(),
        data_dir = %config.dir.display(),
        "QuillKV ready to accept connections"
    );

    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, stopping server..."),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    };

    let handler = CommandHandler::new(Arc::clone(&databases));

    tokio::select! {
        _ = accept_loop(listener, handler, stats) => {}
        _ = shutdown => {}
    }

    databases.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Accepts connections forever, one task per client.
async fn accept_loop(listener: TcpListener, handler: CommandHandler, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = handler.clone();
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }
}
