//! Entry point: loads the config, opens the store, restores the latest
//! backup, spawns the refresh/backup loops, and serves the HTTP API.

mod backup;
mod config;
mod dates;
mod error;
mod resolver;
mod server;
mod store;
mod sync;
mod upstream;

use crate::backup::{BackupManager, RestoreOutcome, LATEST};
use crate::config::AppConfig;
use crate::server::AppState;
use crate::store::ScheduleStore;
use crate::upstream::UpstreamClient;
use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "raspsync=info".parse().unwrap()),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.json"));
    let config = AppConfig::load(&config_path)?;
    info!(config = %config_path.display(), "Configuration loaded");

    let store = Arc::new(
        ScheduleStore::open(&config.database)
            .with_context(|| format!("failed to open store {}", config.database.display()))?,
    );
    let backup = Arc::new(BackupManager::new(&config.backup_folder)?);
    let upstream = Arc::new(UpstreamClient::new(&config)?);

    // Reload the last snapshot so queries work before the first refresh
    // cycle lands. No snapshot is the expected first-run case.
    match backup.restore(&store, LATEST) {
        Ok(RestoreOutcome::NotFound) => info!("No previous backup to restore"),
        Ok(RestoreOutcome::Restored { tables, rows }) => {
            info!(tables, rows, "Restored previous backup")
        }
        Err(e) => warn!(error = %e, "Could not restore previous backup"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let loops = sync::spawn_loops(
        store.clone(),
        upstream,
        backup.clone(),
        &config,
        shutdown_rx,
    );

    let state = Arc::new(AppState::new(store.clone()));
    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address))?;
    info!(address = %config.bind_address, "Serving API");

    axum::serve(listener, server::create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    // Stop the background loops, then take a final snapshot.
    let _ = shutdown_tx.send(());
    for handle in loops {
        let _ = handle.await;
    }
    match backup.save(&store) {
        Ok(name) => info!(snapshot = %name, "Final backup complete"),
        Err(e) => warn!(error = %e, "Final backup failed"),
    }

    Ok(())
}
