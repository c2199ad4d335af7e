//! Proxy Switcher - Entry Point
//!
//! Restores persisted configs and rules, then runs the API server and the
//! connection eviction service until shutdown.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use proxy_switcher::api::{ApiServer, AppState};
use proxy_switcher::config::{Config, LogConfig};
use proxy_switcher::connection::ConnectionRegistry;
use proxy_switcher::error;
use proxy_switcher::repository::{ConfigStore, JsonFileStore, MemoryStore};
use proxy_switcher::routing::RoutingEngine;
use proxy_switcher::services::{
    ConnectionEvictionConfig, ConnectionEvictionHandle, ConnectionEvictionService,
};

#[tokio::main]
async fn main() -> error::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log);

    info!("Starting Proxy Switcher");

    let store: Arc<dyn ConfigStore> = match &config.storage.state_file {
        Some(path) => Arc::new(JsonFileStore::new(path.clone())),
        None => {
            warn!("STATE_FILE not set, configs and rules will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let engine = Arc::new(RoutingEngine::new(config.routing.default_policy));
    let stored = store.load().await?;
    engine.restore(stored)?;
    info!(
        store = %store.describe(),
        proxies = engine.proxies().len(),
        rules = engine.rules().len(),
        default_policy = %config.routing.default_policy.as_str(),
        "Routing state restored"
    );

    let connections = Arc::new(ConnectionRegistry::new());
    let retention = config.retention.retention();

    let (shutdown_tx, _) = watch::channel(false);

    // Start connection eviction service
    let (eviction_handle, eviction_shutdown) = ConnectionEvictionHandle::new();
    let eviction_service = ConnectionEvictionService::new(
        connections.clone(),
        ConnectionEvictionConfig {
            retention,
            check_interval_secs: config.retention.eviction_interval_secs,
        },
    );
    let eviction_task = tokio::spawn(async move {
        eviction_service.run(eviction_shutdown).await;
    });

    let state = AppState::new(engine, connections, store, retention);
    let api_server = ApiServer::new(config.api.clone(), state);
    let api_shutdown = shutdown_tx.subscribe();
    let api_task = tokio::spawn(async move {
        if let Err(e) = api_server.run(api_shutdown).await {
            error!("API server error: {}", e);
        }
    });

    info!("API server started on {}", config.api_addr());

    shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    eviction_handle.shutdown();

    let _ = tokio::join!(api_task, eviction_task);

    info!("Proxy Switcher stopped");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("proxy_switcher={},tower_http=info", log.level))
    });
    let registry = tracing_subscriber::registry().with(filter);

    if log.format == "pretty" {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
