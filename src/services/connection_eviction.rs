//! Connection history eviction service
//!
//! Periodically drops disconnected/errored connection records that fall
//! outside the configured retention window.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument};

use crate::connection::ConnectionRegistry;
use crate::models::Retention;

/// Eviction service configuration
#[derive(Debug, Clone)]
pub struct ConnectionEvictionConfig {
    pub retention: Retention,
    /// How often to evict (in seconds)
    pub check_interval_secs: u64,
}

impl Default for ConnectionEvictionConfig {
    fn default() -> Self {
        Self {
            retention: Retention::new(Some(Duration::from_secs(3600)), Some(1000)),
            check_interval_secs: 60,
        }
    }
}

pub struct ConnectionEvictionService {
    registry: Arc<ConnectionRegistry>,
    config: ConnectionEvictionConfig,
}

impl ConnectionEvictionService {
    pub fn new(registry: Arc<ConnectionRegistry>, config: ConnectionEvictionConfig) -> Self {
        Self { registry, config }
    }

    /// Run until the shutdown channel flips to true
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.check_interval_secs,
            max_age = ?self.config.retention.max_age,
            max_records = ?self.config.retention.max_records,
            "Starting connection eviction service"
        );

        let mut ticker = interval(Duration::from_secs(self.config.check_interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // Skip immediate tick

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.evict_once();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Connection eviction service shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One eviction pass; returns how many records were dropped
    pub fn evict_once(&self) -> usize {
        let evicted = self.registry.evict(&self.config.retention);
        if evicted == 0 {
            debug!("No connection records to evict");
        }
        evicted
    }
}

/// Handle for managing the eviction service
pub struct ConnectionEvictionHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl ConnectionEvictionHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { shutdown_tx: tx }, rx)
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Default for ConnectionEvictionHandle {
    fn default() -> Self {
        Self::new().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConnectionStatus, ConnectionTarget, StateReport, Verdict};

    fn closed_connection(registry: &ConnectionRegistry) -> String {
        let id = registry
            .open(
                &Verdict::allow(None, None),
                ConnectionTarget {
                    host: "example.com".into(),
                    port: 80,
                    ip: None,
                },
            )
            .unwrap();
        registry
            .report_state(&id, &StateReport::new(ConnectionStatus::Error))
            .unwrap();
        id
    }

    #[test]
    fn test_config_default() {
        let config = ConnectionEvictionConfig::default();
        assert_eq!(config.check_interval_secs, 60);
        assert_eq!(config.retention.max_records, Some(1000));
    }

    #[test]
    fn test_evict_once_applies_count_bound() {
        let registry = Arc::new(ConnectionRegistry::new());
        for _ in 0..3 {
            closed_connection(&registry);
        }

        let service = ConnectionEvictionService::new(
            registry.clone(),
            ConnectionEvictionConfig {
                retention: Retention::new(None, Some(1)),
                check_interval_secs: 60,
            },
        );
        assert_eq!(service.evict_once(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_evicts_on_tick_and_stops_on_shutdown() {
        let registry = Arc::new(ConnectionRegistry::new());
        closed_connection(&registry);
        closed_connection(&registry);

        let service = ConnectionEvictionService::new(
            registry.clone(),
            ConnectionEvictionConfig {
                retention: Retention::new(None, Some(0)),
                check_interval_secs: 5,
            },
        );
        let (handle, shutdown) = ConnectionEvictionHandle::new();
        let task = tokio::spawn(async move { service.run(shutdown).await });

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(registry.len(), 0);

        handle.shutdown();
        task.await.unwrap();
    }
}
