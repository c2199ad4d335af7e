use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{Result, SwitcherError};
use crate::models::StoredState;

/// Storage for proxy configs and rules
///
/// The engine only needs records loaded and saved whole; where they live
/// is up to the implementation.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the persisted state; a store with nothing saved yields an empty state
    async fn load(&self) -> Result<StoredState>;

    /// Persist the full state
    async fn save(&self, state: &StoredState) -> Result<()>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// JSON document on the local filesystem
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves the previous document intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    async fn load(&self) -> Result<StoredState> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "State file not found, starting empty");
                return Ok(StoredState::default());
            }
            Err(e) => return Err(e.into()),
        };

        let state: StoredState = serde_json::from_slice(&raw).map_err(|e| {
            SwitcherError::Storage(format!(
                "Failed to parse {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(
            path = %self.path.display(),
            proxies = state.proxies.len(),
            rules = state.rules.len(),
            "Loaded state file"
        );
        Ok(state)
    }

    async fn save(&self, state: &StoredState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_vec_pretty(state)?;
        let tmp = self.temp_path();
        fs::write(&tmp, &body).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), bytes = body.len(), "Saved state file");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// In-process store, used when no state file is configured
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoredState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn load(&self) -> Result<StoredState> {
        Ok(self.state.lock().clone())
    }

    async fn save(&self, state: &StoredState) -> Result<()> {
        *self.state.lock() = state.clone();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProxyConfig, ProxyProtocol, ProxyRule, RuleAction, RuleType};
    use tokio_test::assert_ok;

    fn sample_state() -> StoredState {
        StoredState {
            proxies: vec![ProxyConfig {
                id: "p1".to_string(),
                name: "office".to_string(),
                protocol: ProxyProtocol::Socks5,
                host: "10.0.0.1".to_string(),
                port: 1080,
                username: Some("user".to_string()),
                password: Some("pass".to_string()),
                enabled: false,
            }],
            rules: vec![ProxyRule {
                id: "r1".to_string(),
                name: "lan".to_string(),
                rule_type: RuleType::Cidr,
                value: "192.168.0.0/16".to_string(),
                action: RuleAction::Deny,
                priority: 3,
            }],
        }
    }

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("proxy-switcher-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let path = temp_file("state.json");
        let store = JsonFileStore::new(&path);

        assert_ok!(store.save(&sample_state()).await);
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, sample_state());
        assert!(!store.temp_path().exists());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_file_store_persists_enumerations_verbatim() {
        let path = temp_file("state.json");
        let store = JsonFileStore::new(&path);
        store.save(&sample_state()).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["rules"][0]["rule_type"], "cidr");
        assert_eq!(raw["rules"][0]["action"], "deny");
        assert_eq!(raw["rules"][0]["priority"], 3);
        assert_eq!(raw["proxies"][0]["protocol"], "socks5");

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let store = JsonFileStore::new(temp_file("absent.json"));
        let state = store.load().await.unwrap();
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file() {
        let path = temp_file("state.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{ not json").unwrap();

        let err = JsonFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, SwitcherError::Storage(_)));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.load().await.unwrap().is_empty());

        store.save(&sample_state()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), sample_state());
        assert_eq!(store.describe(), "memory");
    }
}
