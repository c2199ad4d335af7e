use serde::{Deserialize, Serialize};

use super::{ProxyConfig, ProxyRule};

/// Persisted configs and rules
///
/// Rules are kept in insertion order; loading them back in that order
/// preserves the tie-break between equal priorities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredState {
    #[serde(default)]
    pub proxies: Vec<ProxyConfig>,
    #[serde(default)]
    pub rules: Vec<ProxyRule>,
}

impl StoredState {
    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty() && self.rules.is_empty()
    }
}
