//! API server using Axum
//!
//! Exposes the configuration, routing and connection command surface.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::sync::{watch, Mutex};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};

use crate::config::ApiServerConfig;
use crate::connection::ConnectionRegistry;
use crate::error::{Result, SwitcherError};
use crate::models::Retention;
use crate::repository::ConfigStore;
use crate::routing::RoutingEngine;

use super::middleware::{cors_layer, RequestLogging};
use super::routes;

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RoutingEngine>,
    pub connections: Arc<ConnectionRegistry>,
    pub store: Arc<dyn ConfigStore>,
    /// Used by evict requests that carry no bound of their own
    pub retention: Retention,
    pub started_at: Instant,
    write_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        engine: Arc<RoutingEngine>,
        connections: Arc<ConnectionRegistry>,
        store: Arc<dyn ConfigStore>,
        retention: Retention,
    ) -> Self {
        Self {
            engine,
            connections,
            store,
            retention,
            started_at: Instant::now(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Apply a config/rule write and persist it.
    ///
    /// Writes through here are serialized. If the save fails the engine is
    /// restored to the state it had before `op`, so a failed request never
    /// leaves its change live.
    pub async fn apply<T>(&self, op: impl FnOnce(&RoutingEngine) -> Result<T>) -> Result<T> {
        let _guard = self.write_lock.lock().await;
        let previous = self.engine.export_state();
        let out = op(&self.engine)?;

        if let Err(e) = self.store.save(&self.engine.export_state()).await {
            error!(store = %self.store.describe(), "Failed to persist state, rolling back: {}", e);
            if let Err(restore_err) = self.engine.restore(previous) {
                error!("Rollback failed: {}", restore_err);
            }
            return Err(e);
        }
        Ok(out)
    }
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Build the router
    pub fn build_router(&self) -> Router {
        let cors = cors_layer(&self.config.cors_origins);

        routes::create_router(self.state.clone())
            .layer(axum::middleware::from_fn(RequestLogging::log_request))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|_| {
                SwitcherError::InvalidConfig(format!(
                    "Invalid API server address {}:{}",
                    self.config.host, self.config.port
                ))
            })?;

        let router = self.build_router();

        info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .map_err(|e| SwitcherError::Internal(e.to_string()))?;

        info!("API server shut down");
        Ok(())
    }
}
