//! Offline Worker - offline cache and notification host
//!
//! Installs and activates the worker against the configured origin, then
//! serves page requests through it and accepts push messages over HTTP.

use offline_worker::server::{shutdown_signal, start_server, ServerState, SharedState};
use offline_worker::{
    EventOutcome, Executor, InMemoryClients, InMemoryNotifications, ReqwestNetwork, Result,
    Scheduler, WorkerConfig, WorkerError, WorkerEvent,
};
use shell_cache::CacheStorage;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter =
        EnvFilter::from_default_env().add_directive("offline_worker=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Offline Worker...");

    let config = WorkerConfig::from_env()?;
    info!("Port: {}", config.port);
    info!("Origin: {}", config.origin);
    info!("Cache version: {}", config.cache_version);
    info!("Cache dir: {:?}", config.cache_dir);
    info!(
        "Strategies: navigation={}, assets={}, write_back={}",
        config.policy.navigation, config.policy.subresource, config.policy.write_back
    );

    let storage = Arc::new(CacheStorage::new(
        config.cache_dir.clone(),
        config.max_cache_size,
    ));
    storage.init().await?;

    let notifications = Arc::new(InMemoryNotifications::new());
    let clients = Arc::new(InMemoryClients::new());
    let executor = Executor::new(
        storage,
        Arc::new(ReqwestNetwork::new()),
        notifications.clone(),
        clients.clone(),
    );

    let port = config.port;
    let scheduler = Scheduler::new(Arc::new(config), Arc::new(executor));
    let (worker, events) = scheduler.start(1000);

    match worker.send(WorkerEvent::Install).await? {
        EventOutcome::Installed(report) => {
            for failed in &report.failed {
                warn!("Asset not cached: {} ({})", failed.url, failed.error);
            }
            if report.activated.is_none() {
                info!("Skip-waiting disabled; POST /_worker/lifecycle/activate to take control");
            }
        }
        other => warn!("Unexpected install outcome: {:?}", other),
    }

    let state: SharedState = Arc::new(ServerState::new(
        worker,
        scheduler.clone(),
        notifications,
        clients,
    ));

    // Serve until Ctrl+C or SIGTERM
    let served = start_server(state, port, shutdown_signal())
        .await
        .map_err(|e| WorkerError::Config(format!("Server error: {}", e)));

    // Let in-flight events finish before exiting
    scheduler.drain().await;
    events.abort();

    served
}
