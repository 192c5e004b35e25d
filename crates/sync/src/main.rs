//! `fieldboard-syncd` -- background sync daemon.
//!
//! Restores the offline queue from local storage, probes the layout API
//! for connectivity, and drains the queue whenever the API is reachable.
//! Configuration is read from the environment; see [`SyncConfig::from_env`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fieldboard_client::{LayoutApiClient, LayoutBackend};
use fieldboard_sync::connectivity::{probe_loop, Connectivity};
use fieldboard_sync::events::{SyncEvent, SyncEventBus};
use fieldboard_sync::store::JsonStore;
use fieldboard_sync::{SyncConfig, SyncManager};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldboard_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SyncConfig::from_env();
    tracing::info!(
        api_url = %config.api_url,
        storage_dir = %config.storage_dir.display(),
        max_attempts = config.max_attempts,
        "Starting fieldboard-syncd",
    );

    let client = LayoutApiClient::new(&config.api_url).unwrap_or_else(|e| {
        tracing::error!(error = %e, "LAYOUT_API_URL is not a usable base URL");
        std::process::exit(1);
    });
    let store = JsonStore::open(&config.storage_dir).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to open local storage");
        std::process::exit(1);
    });

    let backend: Arc<dyn LayoutBackend> = Arc::new(client);
    let connectivity = Connectivity::new(false);
    let events = Arc::new(SyncEventBus::default());
    let manager = Arc::new(SyncManager::from_config(
        backend.clone(),
        store,
        connectivity.clone(),
        events.clone(),
        &config,
    ));

    if let Err(e) = manager.restore().await {
        tracing::error!(error = %e, "Failed to restore offline queue");
        std::process::exit(1);
    }

    let cancel = CancellationToken::new();

    let probe = tokio::spawn(probe_loop(
        backend,
        connectivity,
        config.health_probe_interval,
        cancel.clone(),
    ));
    let runner = tokio::spawn(manager.clone().run(cancel.clone()));
    let logger = tokio::spawn(log_events(events.clone(), cancel.clone()));

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown requested");
    cancel.cancel();

    let _ = tokio::join!(probe, runner, logger);
    let status = manager.status().await;
    tracing::info!(
        pending = status.pending,
        failed = status.failed,
        terminal = status.terminal,
        "fieldboard-syncd stopped"
    );
}

/// Surface terminal failures and status changes in the daemon log.
async fn log_events(events: Arc<SyncEventBus>, cancel: CancellationToken) {
    let mut rx = events.subscribe();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            event = rx.recv() => match event {
                Ok(SyncEvent::Failed { entry_id, resource, error, terminal: true }) => {
                    tracing::error!(
                        entry_id = %entry_id,
                        resource = %resource,
                        error = %error,
                        "Queue entry needs attention"
                    );
                }
                Ok(SyncEvent::Status(status)) => {
                    tracing::info!(
                        pending = status.pending,
                        syncing = status.syncing,
                        failed = status.failed,
                        terminal = status.terminal,
                        "Sync status"
                    );
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event logger lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            }
        }
    }
}
