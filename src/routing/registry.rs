//! Upstream proxy configuration store
//!
//! Same publication scheme as the rule table: readers load an immutable
//! list, writers serialize and swap in a validated copy.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{Result, SwitcherError};
use crate::models::{ProxyConfig, ProxyProtocol};

pub struct ProxyRegistry {
    current: ArcSwap<Vec<ProxyConfig>>,
    write_lock: Mutex<()>,
}

impl ProxyRegistry {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Vec::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// All configs in insertion order
    pub fn list(&self) -> Arc<Vec<ProxyConfig>> {
        self.current.load_full()
    }

    pub fn get(&self, id: &str) -> Option<ProxyConfig> {
        self.current.load().iter().find(|c| c.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// Enabled configs in insertion order
    pub fn enabled_configs(&self) -> Vec<ProxyConfig> {
        self.current
            .load()
            .iter()
            .filter(|c| c.enabled)
            .cloned()
            .collect()
    }

    /// First enabled config, optionally restricted to one protocol
    pub fn first_enabled(&self, protocol: Option<ProxyProtocol>) -> Option<ProxyConfig> {
        self.current
            .load()
            .iter()
            .filter(|c| c.enabled)
            .find(|c| protocol.map_or(true, |p| c.protocol == p))
            .cloned()
    }

    pub fn add(&self, config: ProxyConfig) -> Result<ProxyConfig> {
        self.write(|configs| {
            config.validate()?;
            if configs.iter().any(|c| c.id == config.id) {
                return Err(SwitcherError::validation(format!(
                    "Proxy config already exists: {}",
                    config.id
                )));
            }
            ensure_unique_upstream(configs, &config)?;

            info!(id = %config.id, upstream = %config.url_without_auth(), "Added proxy config");
            configs.push(config.clone());
            Ok(config)
        })
    }

    pub fn update(&self, config: ProxyConfig) -> Result<ProxyConfig> {
        self.write(|configs| {
            config.validate()?;
            let idx = configs
                .iter()
                .position(|c| c.id == config.id)
                .ok_or_else(|| SwitcherError::proxy_not_found(config.id.clone()))?;
            ensure_unique_upstream(configs, &config)?;

            info!(id = %config.id, enabled = config.enabled, "Updated proxy config");
            configs[idx] = config.clone();
            Ok(config)
        })
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<ProxyConfig> {
        self.change_enabled(id, |_| enabled)
    }

    /// Flip the enabled flag under the write lock
    pub fn toggle(&self, id: &str) -> Result<ProxyConfig> {
        self.change_enabled(id, |current| !current)
    }

    fn change_enabled(&self, id: &str, next: impl FnOnce(bool) -> bool) -> Result<ProxyConfig> {
        self.write(|configs| {
            let config = configs
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| SwitcherError::proxy_not_found(id))?;
            config.enabled = next(config.enabled);

            info!(id = %id, enabled = config.enabled, "Toggled proxy config");
            Ok(config.clone())
        })
    }

    pub fn delete(&self, id: &str) -> Result<ProxyConfig> {
        self.write(|configs| {
            let idx = configs
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| SwitcherError::proxy_not_found(id))?;

            info!(id = %id, "Deleted proxy config");
            Ok(configs.remove(idx))
        })
    }

    /// Replace every config; validated as a whole before publishing
    pub fn replace_all(&self, configs: Vec<ProxyConfig>) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut next: Vec<ProxyConfig> = Vec::with_capacity(configs.len());
        for config in configs {
            config.validate()?;
            if next.iter().any(|c| c.id == config.id) {
                return Err(SwitcherError::validation(format!(
                    "Duplicate proxy config id: {}",
                    config.id
                )));
            }
            ensure_unique_upstream(&next, &config)?;
            next.push(config);
        }

        info!(count = next.len(), "Replaced proxy configs");
        self.current.store(Arc::new(next));
        Ok(())
    }

    fn write<T>(&self, op: impl FnOnce(&mut Vec<ProxyConfig>) -> Result<T>) -> Result<T> {
        let _guard = self.write_lock.lock();

        let mut next = Vec::clone(&self.current.load());
        let out = op(&mut next)?;

        debug!(count = next.len(), "Publishing proxy configs");
        self.current.store(Arc::new(next));
        Ok(out)
    }
}

impl Default for ProxyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_unique_upstream(configs: &[ProxyConfig], config: &ProxyConfig) -> Result<()> {
    match configs
        .iter()
        .find(|c| c.id != config.id && c.same_upstream(config))
    {
        Some(existing) => Err(SwitcherError::validation(format!(
            "Upstream {} is already configured by {}",
            config.url_without_auth(),
            existing.id
        ))),
        None => Ok(()),
    }
}
