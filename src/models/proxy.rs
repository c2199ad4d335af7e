use serde::{Deserialize, Serialize};

use crate::error::{Result, SwitcherError};

/// Upstream proxy protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    Http,
    Https,
    Socks5,
}

impl ProxyProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyProtocol::Http => "http",
            ProxyProtocol::Https => "https",
            ProxyProtocol::Socks5 => "socks5",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "http" => Some(ProxyProtocol::Http),
            "https" => Some(ProxyProtocol::Https),
            "socks5" => Some(ProxyProtocol::Socks5),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProxyProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Upstream proxy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub id: String,
    pub name: String,
    pub protocol: ProxyProtocol,
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub enabled: bool,
}

impl ProxyConfig {
    /// Check required fields and credential shape
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(SwitcherError::validation("Proxy id is required"));
        }
        if self.name.trim().is_empty() {
            return Err(SwitcherError::validation("Proxy name is required"));
        }
        if self.host.trim().is_empty() {
            return Err(SwitcherError::validation("Proxy host is required"));
        }
        if self.host.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(SwitcherError::validation(format!(
                "Proxy host contains invalid characters: {}",
                self.host
            )));
        }
        if self.port == 0 {
            return Err(SwitcherError::validation(
                "Proxy port must be between 1 and 65535",
            ));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(SwitcherError::validation(
                "Proxy password requires a username",
            ));
        }
        Ok(())
    }

    /// Whether both configs address the same upstream
    pub fn same_upstream(&self, other: &ProxyConfig) -> bool {
        self.protocol == other.protocol
            && self.port == other.port
            && self.host.eq_ignore_ascii_case(&other.host)
    }

    /// `host:port` of the upstream
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Copy without the password, for API responses
    pub fn redacted(&self) -> ProxyConfig {
        ProxyConfig {
            password: None,
            ..self.clone()
        }
    }

    /// Proxy URL safe for logs
    pub fn url_without_auth(&self) -> String {
        format!("{}://{}", self.protocol, self.address())
    }
}

/// Add/update payload for a proxy config
///
/// Enumerations and the port arrive loosely typed so that bad values
/// surface as validation errors rather than body rejections.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfigPayload {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub protocol: String,
    pub host: String,
    pub port: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ProxyConfigPayload {
    /// Build a validated config, using `id` for the identity
    pub fn into_config(self, id: String) -> Result<ProxyConfig> {
        let protocol = ProxyProtocol::from_str(&self.protocol).ok_or_else(|| {
            SwitcherError::validation(format!("Unsupported proxy protocol: {}", self.protocol))
        })?;
        let port = u16::try_from(self.port)
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| {
                SwitcherError::validation(format!(
                    "Proxy port must be between 1 and 65535, got {}",
                    self.port
                ))
            })?;

        let config = ProxyConfig {
            id,
            name: self.name.trim().to_string(),
            protocol,
            host: self.host.trim().to_string(),
            port,
            username: self.username.filter(|u| !u.is_empty()),
            password: self.password.filter(|p| !p.is_empty()),
            enabled: self.enabled,
        };
        config.validate()?;
        Ok(config)
    }
}
